//! Rate-limit guard — per-subject, per-channel, per-day send ceiling.

use clientchain_core::config::PolicyConfig;
use clientchain_core::types::{ChannelKind, SubjectProfile};
use std::sync::Arc;

use crate::clock::Clock;
use crate::counter::RateCounter;
use crate::pipeline::{PolicyGuard, Verdict, VetoReason};

/// Counts every attempted send check against a daily key and vetoes once the
/// channel's ceiling is exceeded. The increment happens before the
/// comparison, so a vetoed attempt is counted exactly once — the same
/// INCR-then-compare shape a Redis-backed counter gives.
pub struct RateLimitGuard {
    sms_daily_limit: u64,
    email_daily_limit: u64,
    counter: Arc<dyn RateCounter>,
    clock: Arc<dyn Clock>,
}

impl RateLimitGuard {
    pub fn new(config: &PolicyConfig, counter: Arc<dyn RateCounter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sms_daily_limit: config.sms_daily_limit,
            email_daily_limit: config.email_daily_limit,
            counter,
            clock,
        }
    }

    fn ceiling(&self, channel: ChannelKind) -> u64 {
        match channel {
            ChannelKind::Sms => self.sms_daily_limit,
            ChannelKind::Email => self.email_daily_limit,
        }
    }

    /// Counter key: `rate_limit:{subject}:{channel}:{yyyy-mm-dd}`. The date
    /// component plus the 24h TTL bounds the window either way.
    fn key(&self, subject: &SubjectProfile, channel: ChannelKind) -> String {
        let day = self.clock.now().format("%Y-%m-%d");
        format!("rate_limit:{}:{}:{}", subject.id, channel, day)
    }
}

impl PolicyGuard for RateLimitGuard {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn check(&self, subject: &SubjectProfile, channel: ChannelKind) -> Verdict {
        let max = self.ceiling(channel);
        let count = self
            .counter
            .incr(&self.key(subject, channel), chrono::Duration::hours(24));
        if count > max {
            Verdict::Veto(VetoReason::RateLimited { channel, count, max })
        } else {
            Verdict::Allow
        }
    }
}
