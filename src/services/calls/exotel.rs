use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{answer_url, classify_failure, status_url, CallError, CallHandle, CallProvider};

const EXOTEL_API: &str = "https://api.exotel.com/v1";

/// Exotel "connect" calls. Answer and status callbacks use the same webhook
/// routes as Twilio.
pub struct ExotelCallProvider {
    account_sid: String,
    api_key: String,
    api_token: String,
    virtual_number: String,
    backend_url: String,
    client: reqwest::Client,
}

impl ExotelCallProvider {
    pub fn new(
        account_sid: String,
        api_key: String,
        api_token: String,
        virtual_number: String,
        backend_url: String,
    ) -> Self {
        Self {
            account_sid,
            api_key,
            api_token,
            virtual_number,
            backend_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CallProvider for ExotelCallProvider {
    async fn initiate_call(
        &self,
        phone_number: &str,
        purpose: &str,
        user_id: &str,
    ) -> Result<CallHandle, CallError> {
        let url = format!("{EXOTEL_API}/Accounts/{}/Calls/connect.json", self.account_sid);
        let answer = answer_url(&self.backend_url, purpose, user_id);
        let status = status_url(&self.backend_url);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_token))
            .form(&[
                ("From", self.virtual_number.as_str()),
                ("To", phone_number),
                ("CallerId", self.virtual_number.as_str()),
                ("Url", &answer),
                ("StatusCallback", &status),
            ])
            .send()
            .await
            .context("failed to call Exotel API")?;

        let http_status = resp.status();
        let data: Value = resp.json().await.context("failed to parse Exotel response")?;

        if !http_status.is_success() {
            let message = data["RestException"]["Message"]
                .as_str()
                .unwrap_or("Exotel API error");
            return Err(classify_failure("Exotel", None, message));
        }

        let call_sid = data["Call"]["Sid"]
            .as_str()
            .context("missing Call.Sid in Exotel response")?
            .to_string();

        tracing::info!(%call_sid, "exotel call initiated");
        Ok(CallHandle { call_sid })
    }
}
