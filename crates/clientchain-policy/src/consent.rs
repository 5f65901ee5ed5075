//! Consent guard — the absolute veto.

use clientchain_core::types::{ChannelKind, SubjectProfile};

use crate::pipeline::{PolicyGuard, Verdict, VetoReason};

/// Vetoes any send to a subject who opted out of the channel (or, for email,
/// explicitly withdrew marketing consent). Nothing overrides this.
pub struct ConsentGuard;

impl PolicyGuard for ConsentGuard {
    fn name(&self) -> &'static str {
        "consent"
    }

    fn check(&self, subject: &SubjectProfile, channel: ChannelKind) -> Verdict {
        if subject.opted_out(channel) {
            Verdict::Veto(VetoReason::OptedOut { channel })
        } else {
            Verdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_out_flags_are_per_channel() {
        let mut subject = SubjectProfile::new("Ada");
        subject.opt_out_email = true;

        assert!(ConsentGuard.check(&subject, ChannelKind::Email).is_veto());
        assert_eq!(ConsentGuard.check(&subject, ChannelKind::Sms), Verdict::Allow);
    }
}
