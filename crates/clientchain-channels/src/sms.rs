//! Twilio SMS channel.
//!
//! Uses the Twilio Messages REST API with HTTP basic auth.
//! Requires: Account SID + Auth Token + a provisioned From number.

use async_trait::async_trait;
use clientchain_core::config::TwilioConfig;
use clientchain_core::error::{ClientChainError, Result};
use clientchain_core::traits::SmsSender;

/// SMS adapter backed by the Twilio Messages API.
pub struct TwilioSms {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        if !self.config.is_configured() {
            return Err(ClientChainError::Config(
                "Twilio account_sid/auth_token/from_number not configured".into(),
            ));
        }

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ClientChainError::Channel(format!("Twilio request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientChainError::Channel(format!(
                "Twilio API error {status}: {error_text}"
            )));
        }

        tracing::debug!("📱 Twilio SMS sent → {}", to);
        Ok(())
    }
}
