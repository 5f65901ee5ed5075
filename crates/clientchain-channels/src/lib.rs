//! # ClientChain Channels
//!
//! Concrete implementations of the outbound notification contracts:
//! - `TwilioSms` — SMS via the Twilio Messages API
//! - `SendGridEmail` — plain-text email via the SendGrid v3 API
//! - `RecordingChannel` — in-memory stub that records every send; used by
//!   the engine's tests and as a dry-run channel when no gateway is
//!   configured.
//!
//! No retry logic lives here. A failed send surfaces as
//! `ClientChainError::Channel` and the caller decides what that means.

pub mod email;
pub mod recording;
pub mod sms;

pub use email::SendGridEmail;
pub use recording::{RecordedMessage, RecordingChannel};
pub use sms::TwilioSms;
