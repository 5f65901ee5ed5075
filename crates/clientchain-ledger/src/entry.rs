//! Ledger entry data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an entry adds to or draws from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditDirection {
    Earned,
    Redeemed,
}

impl CreditDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditDirection::Earned => "earned",
            CreditDirection::Redeemed => "redeemed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earned" => Some(CreditDirection::Earned),
            "redeemed" => Some(CreditDirection::Redeemed),
            _ => None,
        }
    }
}

/// What produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    Workflow,
    Referral,
    Story,
    Corporate,
    Booking,
    Redemption,
}

impl CreditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditSource::Workflow => "workflow",
            CreditSource::Referral => "referral",
            CreditSource::Story => "story",
            CreditSource::Corporate => "corporate",
            CreditSource::Booking => "booking",
            CreditSource::Redemption => "redemption",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workflow" => Some(CreditSource::Workflow),
            "referral" => Some(CreditSource::Referral),
            "story" => Some(CreditSource::Story),
            "corporate" => Some(CreditSource::Corporate),
            "booking" => Some(CreditSource::Booking),
            "redemption" => Some(CreditSource::Redemption),
            _ => None,
        }
    }
}

/// One immutable line in a subject's credit history. `amount` is always
/// positive; the direction carries the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub subject_id: String,
    pub direction: CreditDirection,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub source: CreditSource,
    /// What this entry traces back to (workflow id, referral id, ...).
    pub reference_id: Option<String>,
    pub description: Option<String>,
    /// Earned credits may carry an expiry; redemption and display logic
    /// downstream decide what to do with lapsed ones.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed delta this entry applied to the balance.
    pub fn delta(&self) -> i64 {
        match self.direction {
            CreditDirection::Earned => self.amount,
            CreditDirection::Redeemed => -self.amount,
        }
    }
}
