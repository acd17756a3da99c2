pub const RESPOND_PATH: &str = "/voice/call/respond";

const VOICE: &str = "Polly.Matthew";
const LANGUAGE: &str = "en-US";
const SPEECH_HINTS: &str = "appointment, schedule, doctor, yes, no";

/// Marker the model appends when the call should end.
pub const END_CALL_MARKER: &str = "[END_CALL]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep<'a> {
    /// Listen for speech and post it to the given path.
    Gather(&'a str),
    Hangup,
}

/// Voice response document: optional speech followed by either a speech
/// `<Gather>` or a `<Hangup/>`.
pub fn generate_twiml(text: &str, next: NextStep<'_>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);

    if !text.trim().is_empty() {
        xml.push_str(&format!(
            r#"<Say voice="{VOICE}" language="{LANGUAGE}">{}</Say>"#,
            escape_xml(text.trim())
        ));
    }

    match next {
        NextStep::Gather(action) => xml.push_str(&format!(
            r#"<Gather input="speech" action="{}" speechTimeout="auto" hints="{SPEECH_HINTS}"/>"#,
            escape_xml(action)
        )),
        NextStep::Hangup => xml.push_str("<Hangup/>"),
    }

    xml.push_str("</Response>");
    xml
}

/// Removes the end-of-call marker, reporting whether it was present.
pub fn strip_end_marker(reply: &str) -> (String, bool) {
    let ends = reply.contains(END_CALL_MARKER);
    (reply.replace(END_CALL_MARKER, "").trim().to_string(), ends)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_response() {
        let xml = generate_twiml("Hello there", NextStep::Gather(RESPOND_PATH));
        assert!(xml.contains(r#"<Say voice="Polly.Matthew" language="en-US">Hello there</Say>"#));
        assert!(xml.contains(r#"<Gather input="speech" action="/voice/call/respond""#));
        assert!(!xml.contains("<Hangup/>"));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn test_hangup_response() {
        let xml = generate_twiml("Goodbye", NextStep::Hangup);
        assert!(xml.contains("<Hangup/>"));
        assert!(!xml.contains("<Gather"));
    }

    #[test]
    fn test_empty_text_has_no_say() {
        let xml = generate_twiml("  ", NextStep::Hangup);
        assert!(!xml.contains("<Say"));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = generate_twiml("Tom & Jerry <3", NextStep::Hangup);
        assert!(xml.contains("Tom &amp; Jerry &lt;3"));
    }

    #[test]
    fn test_strip_end_marker() {
        assert_eq!(
            strip_end_marker("Thanks, goodbye! [END_CALL]"),
            ("Thanks, goodbye!".to_string(), true)
        );
        assert_eq!(strip_end_marker("Which day?"), ("Which day?".to_string(), false));
    }
}
