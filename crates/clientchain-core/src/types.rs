//! Shared domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messaging channel kinds gated by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sms,
    Email,
}

impl ChannelKind {
    /// Stable key fragment used in rate-limit counter keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client/subject profile — the target a workflow acts on.
///
/// Balance lives here; every mutation of `credits` is paired with a ledger
/// entry by `clientchain-ledger`. Consent flags and timezone feed the policy
/// guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// UTC offset as an RFC3339-style string, e.g. "-05:00". None falls back
    /// to the configured reference offset for quiet-hour checks.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub opt_out_sms: bool,
    #[serde(default)]
    pub opt_out_email: bool,
    /// Explicit marketing consent. `Some(false)` blocks email sends; `None`
    /// means the subject was never asked and only the opt-out flags apply.
    #[serde(default)]
    pub marketing_consent: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubjectProfile {
    /// Create a profile with a fresh id and zero balance.
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("subject-{}", uuid::Uuid::new_v4()),
            name: name.to_string(),
            phone: None,
            email: None,
            timezone: None,
            credits: 0,
            opt_out_sms: false,
            opt_out_email: false,
            marketing_consent: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Whether the subject has opted out of the given channel.
    pub fn opted_out(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Sms => self.opt_out_sms,
            ChannelKind::Email => self.opt_out_email || self.marketing_consent == Some(false),
        }
    }

    /// Destination address for the given channel, if the subject has one.
    pub fn address(&self, channel: ChannelKind) -> Option<&str> {
        match channel {
            ChannelKind::Sms => self.phone.as_deref(),
            ChannelKind::Email => self.email.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opted_out_per_channel() {
        let mut subject = SubjectProfile::new("Ada");
        assert!(!subject.opted_out(ChannelKind::Sms));
        assert!(!subject.opted_out(ChannelKind::Email));

        subject.opt_out_sms = true;
        assert!(subject.opted_out(ChannelKind::Sms));
        assert!(!subject.opted_out(ChannelKind::Email));
    }

    #[test]
    fn test_withdrawn_marketing_consent_blocks_email_only() {
        let mut subject = SubjectProfile::new("Ada");
        subject.marketing_consent = Some(false);
        assert!(subject.opted_out(ChannelKind::Email));
        assert!(!subject.opted_out(ChannelKind::Sms));
    }

    #[test]
    fn test_address_lookup() {
        let subject = SubjectProfile::new("Ada")
            .with_phone("+15550001111")
            .with_email("ada@example.com");
        assert_eq!(subject.address(ChannelKind::Sms), Some("+15550001111"));
        assert_eq!(subject.address(ChannelKind::Email), Some("ada@example.com"));

        let bare = SubjectProfile::new("Bo");
        assert_eq!(bare.address(ChannelKind::Sms), None);
    }
}
