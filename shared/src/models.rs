use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::i18n::DEFAULT_LANGUAGE;

/// Raw contact-form submission as decoded from the request body.
///
/// Fields are kept exactly as submitted; sanitization produces derived
/// values and never writes back into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "coerce_to_string")]
    pub message: String,
    #[serde(default = "default_language", deserialize_with = "coerce_to_string")]
    pub lang: String,
}

impl ContactSubmission {
    pub fn new(email: impl Into<String>, message: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            message: message.into(),
            lang: lang.into(),
        }
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Accepts strings as-is and renders numbers/booleans as text.
/// `null` counts as an empty value; arrays and objects are rejected.
fn coerce_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
        _ => "a scalar",
    }
}

/// Display name plus address, as used for sender and recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Fully composed email handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub from: Mailbox,
    pub reply_to: String,
    pub to: Mailbox,
}

impl OutboundMessage {
    /// The sanitized body goes out both as text and as HTML, since line
    /// breaks and links are already rendered as markup.
    pub fn compose(
        subject: impl Into<String>,
        body: impl Into<String>,
        reply_to: impl Into<String>,
        from: Mailbox,
        to: Mailbox,
    ) -> Self {
        let body = body.into();
        Self {
            subject: subject.into(),
            html: body.clone(),
            text: body,
            from,
            reply_to: reply_to.into(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_lang_defaults_to_english() {
        let submission: ContactSubmission =
            serde_json::from_value(json!({"email": "user@example.com", "message": "hi"})).unwrap();
        assert_eq!(submission.lang, "en");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let submission: ContactSubmission = serde_json::from_value(json!({})).unwrap();
        assert_eq!(submission.email, "");
        assert_eq!(submission.message, "");
        assert_eq!(submission.lang, "en");
    }

    #[test]
    fn test_scalar_values_are_coerced() {
        let submission: ContactSubmission = serde_json::from_value(json!({
            "email": "user@example.com",
            "message": 42,
            "lang": true
        }))
        .unwrap();
        assert_eq!(submission.message, "42");
        assert_eq!(submission.lang, "true");
    }

    #[test]
    fn test_null_message_is_empty() {
        let submission: ContactSubmission =
            serde_json::from_value(json!({"email": "a@b.com", "message": null})).unwrap();
        assert_eq!(submission.message, "");
    }

    #[test]
    fn test_structured_message_is_rejected() {
        let result = serde_json::from_value::<ContactSubmission>(json!({
            "email": "user@example.com",
            "message": {"nested": true}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_compose_mirrors_body_into_html() {
        let message = OutboundMessage::compose(
            "Contact Request",
            "Hello<br>there",
            "user@example.com",
            Mailbox::new("Site", "noreply@example.org"),
            Mailbox::new("Owner", "owner@example.org"),
        );
        assert_eq!(message.text, message.html);
        assert_eq!(message.reply_to, "user@example.com");
        assert_eq!(message.to.email, "owner@example.org");
    }
}
