//! SendGrid email channel.
//!
//! Plain-text mail via the SendGrid v3 `mail/send` API. SendGrid answers a
//! successful queue with 202; anything else is a channel error.

use async_trait::async_trait;
use clientchain_core::config::SendGridConfig;
use clientchain_core::error::{ClientChainError, Result};
use clientchain_core::traits::EmailSender;

/// Email adapter backed by the SendGrid v3 API.
pub struct SendGridEmail {
    config: SendGridConfig,
    client: reqwest::Client,
}

impl SendGridEmail {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for SendGridEmail {
    fn name(&self) -> &str {
        "sendgrid"
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.config.is_configured() {
            return Err(ClientChainError::Config(
                "SendGrid api_key not configured".into(),
            ));
        }

        let payload = serde_json::json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.config.from_email, "name": self.config.from_name},
            "subject": subject,
            "content": [{"type": "text/plain", "value": body}],
        });

        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ClientChainError::Channel(format!("SendGrid request failed: {e}")))?;

        // SendGrid returns 202 Accepted on success.
        if response.status().as_u16() != 202 {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientChainError::Channel(format!(
                "SendGrid API error {status}: {error_text}"
            )));
        }

        tracing::debug!("✉️ SendGrid email sent → {}", to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_sendgrid_is_a_config_error() {
        let email = SendGridEmail::new(SendGridConfig::default());
        let err = email
            .send_email("ada@example.com", "hello", "world")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientChainError::Config(_)));
    }

    #[test]
    fn test_channel_name() {
        let email = SendGridEmail::new(SendGridConfig::default());
        assert_eq!(email.name(), "sendgrid");
    }
}
