//! The ordered guard pipeline.

use clientchain_core::config::PolicyConfig;
use clientchain_core::types::{ChannelKind, SubjectProfile};
use std::sync::Arc;

use crate::clock::Clock;
use crate::consent::ConsentGuard;
use crate::counter::RateCounter;
use crate::quiet_hours::QuietHoursGuard;
use crate::rate_limit::RateLimitGuard;

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow,
    Veto(VetoReason),
}

impl Verdict {
    pub fn is_veto(&self) -> bool {
        matches!(self, Verdict::Veto(_))
    }
}

/// Why a send was suppressed.
#[derive(Debug, Clone, PartialEq)]
pub enum VetoReason {
    OptedOut { channel: ChannelKind },
    QuietHours { local_hour: u32 },
    RateLimited { channel: ChannelKind, count: u64, max: u64 },
}

impl std::fmt::Display for VetoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VetoReason::OptedOut { channel } => write!(f, "subject opted out of {channel}"),
            VetoReason::QuietHours { local_hour } => {
                write!(f, "outside send window (local hour {local_hour})")
            }
            VetoReason::RateLimited { channel, count, max } => {
                write!(f, "{channel} daily ceiling reached ({count}/{max})")
            }
        }
    }
}

/// One policy predicate. Guards are pure with respect to the subject; the
/// rate-limit guard is the only one with internal state (its counter).
pub trait PolicyGuard: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, subject: &SubjectProfile, channel: ChannelKind) -> Verdict;
}

/// AND-composed, ordered guard chain. First veto wins.
pub struct PolicyPipeline {
    guards: Vec<Box<dyn PolicyGuard>>,
}

impl PolicyPipeline {
    /// The standard chain: consent, quiet hours, then rate limit.
    /// Consent is first so an opted-out subject vetoes unconditionally;
    /// rate limit is last so vetoed-for-other-reasons attempts don't burn
    /// counter budget.
    pub fn standard(
        config: &PolicyConfig,
        counter: Arc<dyn RateCounter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guards: vec![
                Box::new(ConsentGuard),
                Box::new(QuietHoursGuard::new(config, clock.clone())),
                Box::new(RateLimitGuard::new(config, counter, clock)),
            ],
        }
    }

    /// Custom chain, mostly for tests.
    pub fn with_guards(guards: Vec<Box<dyn PolicyGuard>>) -> Self {
        Self { guards }
    }

    /// Evaluate every guard in order; the first veto is returned and logged.
    pub fn evaluate(&self, subject: &SubjectProfile, channel: ChannelKind) -> Verdict {
        for guard in &self.guards {
            if let Verdict::Veto(reason) = guard.check(subject, channel) {
                tracing::info!(
                    "🚫 Policy veto [{}] for subject {} on {}: {}",
                    guard.name(),
                    subject.id,
                    channel,
                    reason
                );
                return Verdict::Veto(reason);
            }
        }
        Verdict::Allow
    }
}
