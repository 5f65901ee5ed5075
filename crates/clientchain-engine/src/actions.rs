//! Workflow step actions.

use serde::{Deserialize, Serialize};

/// One step of a workflow's ordered side-effect list. A closed enum so an
/// unhandled kind is a compile error rather than a silent no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// The sole suspension point: the execution goes dormant for `seconds`.
    Wait { seconds: u64 },
    SendSms { message: String },
    SendEmail { subject: String, body: String },
    AddCredits { amount: i64 },
    /// Partial JSON patch onto the subject profile.
    UpdateSubject { fields: serde_json::Value },
    InvokeWebhook { url: String },
    /// Open a staff follow-up task.
    CreateTask { title: String },
    /// Lightweight marker for an in-person flow (e.g. the front-desk
    /// friend-tagging prompt).
    RecordPrompt { kind: String },
    /// Messages (and optionally credits) the referrer found in the
    /// execution's context, not the subject themselves.
    NotifyReferrer { message: String, credit_amount: i64 },
}

impl Action {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Wait { .. } => "wait",
            Action::SendSms { .. } => "send_sms",
            Action::SendEmail { .. } => "send_email",
            Action::AddCredits { .. } => "add_credits",
            Action::UpdateSubject { .. } => "update_subject",
            Action::InvokeWebhook { .. } => "invoke_webhook",
            Action::CreateTask { .. } => "create_task",
            Action::RecordPrompt { .. } => "record_prompt",
            Action::NotifyReferrer { .. } => "notify_referrer",
        }
    }
}

/// Substitute `{name}` and `{credits}` placeholders in a message body.
pub fn render_message(template: &str, name: &str, credits: i64) -> String {
    template
        .replace("{name}", name)
        .replace("{credits}", &credits.to_string())
}
