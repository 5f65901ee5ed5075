//! Outbound notification contracts.
//!
//! The engine depends only on these traits; concrete gateways (Twilio,
//! SendGrid) live in `clientchain-channels` and are swappable. Failures
//! surface as `ClientChainError::Channel` — no retry logic here.

use crate::error::Result;
use async_trait::async_trait;

/// Send a text message to a phone number.
#[async_trait]
pub trait SmsSender: Send + Sync {
    fn name(&self) -> &str;
    async fn send_sms(&self, to: &str, body: &str) -> Result<()>;
}

/// Send a plain-text email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &str;
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
