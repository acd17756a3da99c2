use std::sync::LazyLock;

use regex::Regex;

use crate::models::ExtractedEmail;

static SPOKEN_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+at\s+").expect("valid regex"));

// Local part may contain spaces ("rohit verma 1569@gmail.com"); they are stripped later.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9._%+\-\s]+)@([a-zA-Z0-9.\-]+\.[a-zA-Z]{2,})").expect("valid regex")
});

static PLAIN_EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub email: Option<ExtractedEmail>,
    /// The sentence with the address removed.
    pub residual: String,
}

/// Pulls a possibly voice-transcribed address out of `input` and returns what is
/// left of the sentence. Spoken " at " is read as `@`.
pub fn extract_email_and_body(input: &str) -> Extraction {
    if input.trim().is_empty() {
        return Extraction {
            email: None,
            residual: String::new(),
        };
    }

    let normalized = SPOKEN_AT_RE.replace_all(input, "@");
    let Some(caps) = EMAIL_RE.captures(&normalized) else {
        return Extraction {
            email: None,
            residual: input.to_string(),
        };
    };

    let email = ExtractedEmail::new(&caps[1], &caps[2]);
    let residual = normalized.replacen(&caps[0], "", 1).trim().to_string();

    Extraction {
        email: Some(email),
        residual,
    }
}

pub fn extract_email(input: &str) -> Option<ExtractedEmail> {
    extract_email_and_body(input).email
}

/// First literal address in `text`, without any spoken-form repair.
pub fn find_plain_email(text: &str) -> Option<String> {
    PLAIN_EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_in_local_part_are_removed() {
        let email = extract_email("rohit verma 1569@gmail.com").unwrap();
        assert_eq!(email.to_string(), "rohitverma1569@gmail.com");
    }

    #[test]
    fn test_spoken_at_separator() {
        let email = extract_email("rohit at gmail.com").unwrap();
        assert_eq!(email.to_string(), "rohit@gmail.com");
    }

    #[test]
    fn test_domain_is_lowercased() {
        let email = extract_email("Rohit@GMail.COM").unwrap();
        assert_eq!(email.local_part, "Rohit");
        assert_eq!(email.domain, "gmail.com");
    }

    #[test]
    fn test_residual_body() {
        let extraction = extract_email_and_body("priya at example.org, the report is ready");
        assert_eq!(extraction.email.unwrap().to_string(), "priya@example.org");
        assert_eq!(extraction.residual, ", the report is ready");
    }

    #[test]
    fn test_no_address_keeps_input() {
        let extraction = extract_email_and_body("tell him I'm running late");
        assert_eq!(extraction.email, None);
        assert_eq!(extraction.residual, "tell him I'm running late");
    }

    #[test]
    fn test_domain_needs_tld() {
        assert_eq!(extract_email("someone@localhost"), None);
    }

    #[test]
    fn test_find_plain_email() {
        assert_eq!(
            find_plain_email("schedule it and email me at me.self@mail.example.com please"),
            Some("me.self@mail.example.com".to_string())
        );
        assert_eq!(find_plain_email("email me"), None);
    }
}
