//! Quiet-hours guard — suppresses messages outside the local send window.

use chrono::{FixedOffset, Offset, Timelike, Utc};
use clientchain_core::config::PolicyConfig;
use clientchain_core::types::{ChannelKind, SubjectProfile};
use std::sync::Arc;

use crate::clock::Clock;
use crate::pipeline::{PolicyGuard, Verdict, VetoReason};

/// Allows sends only within `[allowed_from_hour, allowed_until_hour)` in the
/// subject's local time. A subject without a usable timezone degrades to the
/// configured reference offset.
pub struct QuietHoursGuard {
    allowed_from_hour: u32,
    allowed_until_hour: u32,
    reference_offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl QuietHoursGuard {
    pub fn new(config: &PolicyConfig, clock: Arc<dyn Clock>) -> Self {
        let reference_offset = config
            .reference_utc_offset
            .parse::<FixedOffset>()
            .unwrap_or_else(|_| Utc.fix());
        Self {
            allowed_from_hour: config.allowed_from_hour,
            allowed_until_hour: config.allowed_until_hour,
            reference_offset,
            clock,
        }
    }

    fn local_hour(&self, subject: &SubjectProfile) -> u32 {
        let offset = subject
            .timezone
            .as_deref()
            .and_then(|tz| tz.parse::<FixedOffset>().ok())
            .unwrap_or(self.reference_offset);
        self.clock.now().with_timezone(&offset).hour()
    }
}

impl PolicyGuard for QuietHoursGuard {
    fn name(&self) -> &'static str {
        "quiet_hours"
    }

    fn check(&self, subject: &SubjectProfile, _channel: ChannelKind) -> Verdict {
        let local_hour = self.local_hour(subject);
        if local_hour >= self.allowed_from_hour && local_hour < self.allowed_until_hour {
            Verdict::Allow
        } else {
            Verdict::Veto(VetoReason::QuietHours { local_hour })
        }
    }
}
