//! Built-in workflow templates.
//!
//! Presets an operator can apply as-is instead of hand-assembling triggers
//! and actions. Applying one creates a regular, editable definition.

use clientchain_core::error::{ClientChainError, Result};
use serde::Serialize;

use crate::actions::Action;
use crate::definitions::{Trigger, WorkflowDefinition};
use crate::store::AutomationDb;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub triggers: Vec<Trigger>,
    pub actions: Vec<Action>,
}

/// The built-in preset catalog.
pub fn template_catalog() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            key: "treatment_completed_referral_prompt",
            name: "Referral prompt after treatment",
            description: "Tag-a-friend prompt at the desk, then a referral SMS two days later",
            triggers: vec![Trigger::BookingCompleted],
            actions: vec![
                Action::RecordPrompt { kind: "friend_tag".into() },
                Action::Wait { seconds: 2 * 24 * 3600 },
                Action::SendSms {
                    message: "Hi {name}! Loved your visit? Share your referral link with a friend and you both get credits."
                        .into(),
                },
            ],
        },
        WorkflowTemplate {
            key: "friend_books_notify_referrer",
            name: "Notify referrer when their friend books",
            description: "Thank the referrer by SMS and grant 50 credits",
            triggers: vec![Trigger::BookingCompleted],
            actions: vec![Action::NotifyReferrer {
                message: "{name}, your friend just booked — 50 credits are on your account!".into(),
                credit_amount: 50,
            }],
        },
        WorkflowTemplate {
            key: "no_referral_30_days",
            name: "Re-engage after 30 quiet days",
            description: "Nudge subjects who have not referred anyone in a month",
            triggers: vec![Trigger::NoReferralSince { days: 30 }],
            actions: vec![Action::SendSms {
                message: "Hi {name}, you have {credits} credits waiting. Refer a friend to earn more!"
                    .into(),
            }],
        },
        WorkflowTemplate {
            key: "high_lead_score_followup",
            name: "High lead score follow-up",
            description: "Open a staff task and send a personal email to hot leads",
            triggers: vec![Trigger::LeadScoreAbove { threshold: 80 }],
            actions: vec![
                Action::CreateTask { title: "Call high-intent lead".into() },
                Action::SendEmail {
                    subject: "A little something for you".into(),
                    body: "Hi {name}, we noticed you've been looking around — here's priority booking."
                        .into(),
                },
            ],
        },
        WorkflowTemplate {
            key: "abandoned_booking_recovery",
            name: "Abandoned booking recovery",
            description: "Wait an hour, then nudge with a small credit incentive",
            triggers: vec![Trigger::BookingAbandoned { within_hours: 24 }],
            actions: vec![
                Action::Wait { seconds: 3600 },
                Action::AddCredits { amount: 25 },
                Action::SendSms {
                    message: "{name}, your booking is still open — we added 25 credits to sweeten it."
                        .into(),
                },
            ],
        },
    ]
}

/// Create a definition from a template key.
pub fn apply_template(db: &AutomationDb, key: &str) -> Result<WorkflowDefinition> {
    let template = template_catalog()
        .into_iter()
        .find(|t| t.key == key)
        .ok_or_else(|| ClientChainError::NotFound(format!("template {key}")))?;
    db.create_workflow(template.name, template.triggers, template.actions)
}
