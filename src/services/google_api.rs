use anyhow::Context;
use serde_json::Value;

/// Reads a Google REST response, turning non-2xx statuses into errors that carry
/// the API's own message.
pub async fn read_json(resp: reqwest::Response, api: &str) -> anyhow::Result<Value> {
    let status = resp.status();
    let data: Value = resp
        .json()
        .await
        .with_context(|| format!("failed to parse {api} response"))?;

    if !status.is_success() {
        anyhow::bail!("{api} error ({status}): {}", error_message(&data));
    }

    Ok(data)
}

pub fn error_message(data: &Value) -> String {
    data["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_api_message() {
        let data = json!({"error": {"code": 401, "message": "Invalid Credentials"}});
        assert_eq!(error_message(&data), "Invalid Credentials");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        let data = json!({"oops": true});
        assert_eq!(error_message(&data), r#"{"oops":true}"#);
    }
}
