use crate::models::{CallSession, Speaker};
use crate::services::twiml::END_CALL_MARKER;

/// Prompt for the assistant's next spoken line on a live call.
pub fn next_line_prompt(session: &CallSession, last_speech: &str) -> String {
    format!(
        r#"You are a personal AI assistant on a phone call.
User's purpose for this call: {purpose}

Conversation history:
{history}

Role:
- Be polite, professional, and concise.
- If you have achieved the goal (e.g. booked the appointment), end the call gracefully.
- If you are stuck, ask for clarification.
- If you want to end the call, include "{END_CALL_MARKER}" at the end of your response.

Human's last response: "{last_speech}"
AI Response:"#,
        purpose = session.purpose,
        history = session.transcript(),
    )
}

pub fn summary_prompt(session: &CallSession) -> String {
    format!(
        "Summarize the following phone call conversation for the user.\n\
         Purpose: {}\n\n\
         History:\n{}\n\n\
         Format as 5-8 bullet points. Include success/failure status.",
        session.purpose,
        session.transcript()
    )
}

/// Subject and body of the post-call report emailed to the user.
pub fn summary_email(session: &CallSession, status: &str, summary: &str) -> (String, String) {
    let transcript = session
        .history
        .iter()
        .map(|t| {
            let who = match t.role {
                Speaker::Human => "HUMAN",
                Speaker::Ai => "AI",
            };
            format!("{who}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let subject = format!("AI Call Summary - {}", session.purpose);
    let body = format!(
        "Here is the summary of the AI call made on your behalf:\n\n\
         - Purpose: {}\n\
         - Date: {}\n\
         - Status: {status}\n\n\
         Summary:\n{}\n\n\
         Full Transcript:\n{transcript}",
        session.purpose,
        session.started_at.format("%a %b %-d %Y, %-I:%M %p"),
        summary.trim(),
    );

    (subject, body)
}
