use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinSet;

use super::{
    encode_message, generate_subject, needs_professionalizing, professionalize_body,
    reply_subject, EmailService,
};
use crate::errors::CommandError;
use crate::models::{ActionResult, Credential, EmailDetails};
use crate::services::ai::CompletionProvider;
use crate::services::email_address::extract_email;
use crate::services::google_api::read_json;

const GMAIL_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const API: &str = "Gmail API";

const SEARCH_DEFAULT: u32 = 10;
const SEARCH_CAP: u32 = 50;
const SUMMARY_DEFAULT: u32 = 5;
const SUMMARY_CAP: u32 = 10;
const SUMMARY_QUERY: &str = "is:unread";
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compose {
    Send,
    Draft,
}

/// Gmail REST client. Subjects and short bodies are written by the completion
/// provider.
pub struct GmailAgent {
    client: reqwest::Client,
    llm: Arc<dyn CompletionProvider>,
    base_url: String,
}

impl GmailAgent {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self::with_base_url(llm, GMAIL_URL.to_string())
    }

    pub fn with_base_url(llm: Arc<dyn CompletionProvider>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            llm,
            base_url,
        }
    }

    async fn get(&self, token: &str, path: &str, query: &[(String, String)]) -> anyhow::Result<Value> {
        get_json(&self.client, &format!("{}/{path}", self.base_url), token, query).await
    }

    async fn post(&self, token: &str, path: &str, body: &Value) -> anyhow::Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call {API}: {url}"))?;
        read_json(resp, API).await
    }

    async fn send_raw(&self, token: &str, raw: String, thread_id: Option<&str>) -> anyhow::Result<String> {
        let mut body = json!({ "raw": raw });
        if let Some(thread) = thread_id {
            body["threadId"] = json!(thread);
        }
        let sent = self.post(token, "messages/send", &body).await?;
        Ok(sent["id"].as_str().unwrap_or_default().to_string())
    }

    async fn compose(&self, mode: Compose, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        let Some(raw_to) = details.to.as_deref() else {
            return Ok(ActionResult::error("Email recipient is required"));
        };
        let to = extract_email(raw_to)
            .map(|e| e.to_string())
            .unwrap_or_else(|| raw_to.trim().to_string());

        let instruction = details
            .prompt_for_body
            .as_deref()
            .or(details.body.as_deref())
            .unwrap_or("a short check-in");

        let subject = match details.subject.as_deref() {
            Some(s) => s.to_string(),
            None => generate_subject(self.llm.as_ref(), instruction).await?,
        };

        let mut body = details.body.clone().unwrap_or_default();
        if needs_professionalizing(details.body.as_deref(), details.prompt_for_body.as_deref()) {
            match professionalize_body(self.llm.as_ref(), instruction, &to, &subject).await {
                Ok(written) if !written.is_empty() => body = written,
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "keeping original email body"),
            }
        }

        let raw = encode_message(&[("To", &to), ("Subject", &subject)], &body);

        match mode {
            Compose::Send => {
                let message_id = self.send_raw(token, raw, None).await?;
                tracing::info!(%to, %message_id, "email sent");
                Ok(ActionResult::success(
                    "email_sent",
                    format!("Email sent to {to}"),
                    json!({ "to": to, "subject": subject, "body": body, "messageId": message_id }),
                ))
            }
            Compose::Draft => {
                let draft = self
                    .post(token, "drafts", &json!({ "message": { "raw": raw } }))
                    .await?;
                let draft_id = draft["id"].as_str().unwrap_or_default();
                tracing::info!(%to, %draft_id, "draft created");
                Ok(ActionResult::success(
                    "email_drafted",
                    "Email draft created (not sent)",
                    json!({ "to": to, "subject": subject, "body": body, "draftId": draft_id }),
                ))
            }
        }
    }

    async fn reply(&self, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        let (Some(message_id), Some(body)) = (details.message_id.as_deref(), details.body.as_deref()) else {
            return Ok(ActionResult::error("Message ID and reply body are required"));
        };

        let original = self
            .get(token, &format!("messages/{message_id}"), &metadata_query(&["From", "Subject", "Message-ID"]))
            .await?;
        let from = header_value(&original, "From").unwrap_or_default();
        let to = extract_email(&from).map(|e| e.to_string()).unwrap_or(from);
        let subject = reply_subject(&header_value(&original, "Subject").unwrap_or_default());
        let thread_id = original["threadId"].as_str();

        let mut headers = vec![("To", to.as_str()), ("Subject", subject.as_str())];
        let reference = header_value(&original, "Message-ID");
        if let Some(r) = reference.as_deref() {
            headers.push(("In-Reply-To", r));
            headers.push(("References", r));
        }

        let raw = encode_message(&headers, body);
        let sent_id = self.send_raw(token, raw, thread_id).await?;

        Ok(ActionResult::success(
            "email_replied",
            format!("Reply sent to {to}"),
            json!({ "to": to, "subject": subject, "messageId": sent_id, "inReplyTo": message_id }),
        ))
    }

    async fn list_ids(&self, token: &str, query: &str, max: u32) -> anyhow::Result<Vec<String>> {
        let listing = self
            .get(
                token,
                "messages",
                &[("q".to_string(), query.to_string()), ("maxResults".to_string(), max.to_string())],
            )
            .await?;

        Ok(listing["messages"]
            .as_array()
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Fetches metadata for every id concurrently, preserving input order.
    async fn fetch_metadata(&self, token: &str, ids: Vec<String>, headers: &[&str]) -> anyhow::Result<Vec<Value>> {
        let query = metadata_query(headers);
        let mut set = JoinSet::new();

        for (idx, id) in ids.iter().enumerate() {
            let client = self.client.clone();
            let url = format!("{}/messages/{id}", self.base_url);
            let token = token.to_string();
            let query = query.clone();
            set.spawn(async move { (idx, get_json(&client, &url, &token, &query).await) });
        }

        let mut messages = vec![Value::Null; ids.len()];
        while let Some(joined) = set.join_next().await {
            let (idx, result) = joined.context("message fetch task failed")?;
            messages[idx] = result?;
        }
        Ok(messages)
    }

    async fn search(&self, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        let Some(query) = details.query.as_deref() else {
            return Ok(ActionResult::error("Search query is required"));
        };
        let max = details.max_results.unwrap_or(SEARCH_DEFAULT).min(SEARCH_CAP);

        let ids = self.list_ids(token, query, max).await?;
        let messages = self.fetch_metadata(token, ids, &["From", "Subject", "Date"]).await?;

        let results: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "id": m["id"],
                    "threadId": m["threadId"],
                    "from": header_value(m, "From"),
                    "subject": header_value(m, "Subject"),
                    "date": header_value(m, "Date"),
                    "snippet": m["snippet"],
                })
            })
            .collect();

        Ok(ActionResult::success(
            "emails_found",
            format!("Found {} emails matching \"{query}\"", results.len()),
            json!({ "query": query, "count": results.len(), "emails": results }),
        ))
    }

    async fn label(&self, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        let Some(message_id) = details.message_id.as_deref() else {
            return Ok(ActionResult::error("Message ID and labels are required"));
        };
        if details.labels.is_empty() {
            return Ok(ActionResult::error("Message ID and labels are required"));
        }

        let existing = self.get(token, "labels", &[]).await?;
        let known: Vec<(String, String)> = existing["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| Some((l["name"].as_str()?.to_string(), l["id"].as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut label_ids = Vec::with_capacity(details.labels.len());
        for name in &details.labels {
            if let Some((_, id)) = known.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                label_ids.push(id.clone());
                continue;
            }
            let created = self
                .post(
                    token,
                    "labels",
                    &json!({ "name": name, "labelListVisibility": "labelShow", "messageListVisibility": "show" }),
                )
                .await?;
            tracing::info!(label = %name, "created label");
            label_ids.push(created["id"].as_str().unwrap_or_default().to_string());
        }

        self.post(
            token,
            &format!("messages/{message_id}/modify"),
            &json!({ "addLabelIds": label_ids }),
        )
        .await?;

        Ok(ActionResult::success(
            "email_labeled",
            format!("Added labels: {}", details.labels.join(", ")),
            json!({ "messageId": message_id, "labels": details.labels }),
        ))
    }

    async fn summarize(&self, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        let query = details.query.as_deref().unwrap_or(SUMMARY_QUERY);
        let max = details.max_results.unwrap_or(SUMMARY_DEFAULT).min(SUMMARY_CAP);

        let ids = self.list_ids(token, query, max).await?;
        if ids.is_empty() {
            return Ok(ActionResult::success(
                "emails_summarized",
                "No emails found matching your query",
                json!({ "summary": "No emails found matching your query", "count": 0 }),
            ));
        }

        let messages = self.fetch_metadata(token, ids, &["From", "Subject"]).await?;
        let summary = summary_text(&messages);

        Ok(ActionResult::success(
            "emails_summarized",
            format!("Summarized {} emails", messages.len()),
            json!({ "summary": summary, "count": messages.len() }),
        ))
    }

    async fn dispatch(&self, action: &str, details: &EmailDetails, token: &str) -> anyhow::Result<ActionResult> {
        match action {
            "send" => self.compose(Compose::Send, details, token).await,
            "draft" => self.compose(Compose::Draft, details, token).await,
            "reply" => self.reply(details, token).await,
            "search" => self.search(details, token).await,
            "label" => self.label(details, token).await,
            "summarize" => self.summarize(details, token).await,
            other => Ok(CommandError::UnknownAction {
                service: "email".to_string(),
                action: other.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl EmailService for GmailAgent {
    async fn perform(
        &self,
        action: &str,
        details: &EmailDetails,
        user_id: &str,
        credential: &Credential,
    ) -> ActionResult {
        if credential.access_token.is_empty() {
            return ActionResult::error("No access token provided");
        }

        tracing::info!(%action, %user_id, "email action");

        match self.dispatch(action, details, &credential.access_token).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%action, error = %e, "email action failed");
                ActionResult::error(format!("Failed to {action} email: {e:#}"))
            }
        }
    }

    async fn send_notification(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        credential: &Credential,
    ) -> anyhow::Result<String> {
        let raw = encode_message(&[("To", to), ("Subject", subject)], body);
        self.send_raw(&credential.access_token, raw, None).await
    }
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    query: &[(String, String)],
) -> anyhow::Result<Value> {
    let resp = client
        .get(url)
        .bearer_auth(token)
        .query(query)
        .send()
        .await
        .with_context(|| format!("failed to call {API}: {url}"))?;
    read_json(resp, API).await
}

fn metadata_query(headers: &[&str]) -> Vec<(String, String)> {
    let mut query = vec![("format".to_string(), "metadata".to_string())];
    query.extend(
        headers
            .iter()
            .map(|h| ("metadataHeaders".to_string(), h.to_string())),
    );
    query
}

/// Value of a header in a Gmail message resource.
fn header_value(message: &Value, name: &str) -> Option<String> {
    message["payload"]["headers"]
        .as_array()?
        .iter()
        .find(|h| h["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(name)))?["value"]
        .as_str()
        .map(str::to_string)
}

fn summary_text(messages: &[Value]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let from = header_value(m, "From").unwrap_or_else(|| "Unknown sender".to_string());
            let subject = header_value(m, "Subject").unwrap_or_else(|| "(no subject)".to_string());
            let preview: String = m["snippet"]
                .as_str()
                .unwrap_or_default()
                .chars()
                .take(PREVIEW_CHARS)
                .collect();
            format!("{}. From: {from}\n   Subject: {subject}\n   Preview: {preview}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
