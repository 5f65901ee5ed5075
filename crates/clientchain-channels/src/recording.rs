//! In-memory recording channel.
//!
//! Implements both sender contracts and records every message instead of
//! transmitting it. Serves two purposes: a dry-run channel when no gateway
//! credentials are configured, and a test double for the engine.

use async_trait::async_trait;
use clientchain_core::error::{ClientChainError, Result};
use clientchain_core::traits::{EmailSender, SmsSender};
use clientchain_core::types::ChannelKind;
use std::sync::Mutex;

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub channel: ChannelKind,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// Records sends in memory. When `fail_next` is armed, the next send errors
/// with a channel error — lets tests exercise the failed-execution path.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<RecordedMessage>>,
    fail_next: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure on the next send.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<RecordedMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn record(&self, message: RecordedMessage) -> Result<()> {
        let mut armed = self.fail_next.lock().unwrap();
        if *armed {
            *armed = false;
            return Err(ClientChainError::Channel("simulated gateway outage".into()));
        }
        drop(armed);
        tracing::debug!("📋 Recorded {} → {}", message.channel, message.to);
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl SmsSender for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        self.record(RecordedMessage {
            channel: ChannelKind::Sms,
            to: to.to_string(),
            subject: None,
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.record(RecordedMessage {
            channel: ChannelKind::Email,
            to: to.to_string(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        })
    }
}
