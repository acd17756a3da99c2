use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{answer_url, classify_failure, status_url, CallError, CallHandle, CallProvider};

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioCallProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    backend_url: String,
    client: reqwest::Client,
}

impl TwilioCallProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String, backend_url: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            backend_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CallProvider for TwilioCallProvider {
    async fn initiate_call(
        &self,
        phone_number: &str,
        purpose: &str,
        user_id: &str,
    ) -> Result<CallHandle, CallError> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(anyhow::anyhow!(
                "Twilio client not initialized. Check TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN."
            )
            .into());
        }

        let url = format!("{TWILIO_API}/Accounts/{}/Calls.json", self.account_sid);
        let answer = answer_url(&self.backend_url, purpose, user_id);
        let status = status_url(&self.backend_url);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", phone_number),
                ("From", &self.from_number),
                ("Url", &answer),
                ("StatusCallback", &status),
            ])
            .send()
            .await
            .context("failed to call Twilio API")?;

        let http_status = resp.status();
        let data: Value = resp.json().await.context("failed to parse Twilio response")?;

        if !http_status.is_success() {
            let message = data["message"].as_str().unwrap_or("Twilio API error");
            return Err(classify_failure("Twilio", data["code"].as_i64(), message));
        }

        let call_sid = data["sid"]
            .as_str()
            .context("missing sid in Twilio response")?
            .to_string();

        Ok(CallHandle { call_sid })
    }
}
