//! Workflow definitions and their trigger conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// A named automation: when any trigger matches an incoming event, the
/// ordered action list runs against the event's subject. Definitions are
/// never deleted, only paused, so execution history stays attributable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Paused,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(WorkflowStatus::Active),
            "paused" => Some(WorkflowStatus::Paused),
            _ => None,
        }
    }
}

/// Match condition for spawning an execution. Parameterized variants compare
/// against the event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    BookingCompleted,
    ReferralCreated,
    /// Fires when `payload.days_since >= days`.
    NoReferralSince { days: i64 },
    /// Fires when `payload.score > threshold`.
    LeadScoreAbove { threshold: i64 },
    /// Fires when `payload.hours_since <= within_hours`.
    BookingAbandoned { within_hours: i64 },
}

impl Trigger {
    /// The event name this trigger listens for.
    pub fn event_type(&self) -> &'static str {
        match self {
            Trigger::BookingCompleted => "booking_completed",
            Trigger::ReferralCreated => "referral_created",
            Trigger::NoReferralSince { .. } => "no_referral_since",
            Trigger::LeadScoreAbove { .. } => "lead_score_above",
            Trigger::BookingAbandoned { .. } => "booking_abandoned",
        }
    }

    /// Whether this trigger fires for the given event.
    pub fn matches(&self, event_type: &str, payload: &serde_json::Value) -> bool {
        if event_type != self.event_type() {
            return false;
        }
        match self {
            Trigger::BookingCompleted | Trigger::ReferralCreated => true,
            Trigger::NoReferralSince { days } => {
                payload["days_since"].as_i64().is_some_and(|d| d >= *days)
            }
            Trigger::LeadScoreAbove { threshold } => {
                payload["score"].as_i64().is_some_and(|s| s > *threshold)
            }
            Trigger::BookingAbandoned { within_hours } => payload["hours_since"]
                .as_i64()
                .is_some_and(|h| h <= *within_hours),
        }
    }
}

impl WorkflowDefinition {
    pub fn new(name: &str, triggers: Vec<Trigger>, actions: Vec<Action>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            triggers,
            actions,
            status: WorkflowStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// First trigger that fires for the event, if any.
    pub fn matching_trigger(&self, event_type: &str, payload: &serde_json::Value) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.matches(event_type, payload))
    }
}
