//! Field validators for contact submissions

use email_address::EmailAddress;

/// Longest address accepted, per the SMTP path limit.
const MAX_EMAIL_LENGTH: usize = 254;

/// Client-facing validation outcome, reported as a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    MalformedEmail,
    MalformedMessage,
}

impl ValidationFailure {
    /// Machine-readable code returned in the `msg` field
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::MalformedEmail => "MALFORMED_EMAIL",
            ValidationFailure::MalformedMessage => "MALFORMED_MESSAGE",
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Validate a bare email address.
///
/// Display-name forms (`Name <a@b.com>`) are rejected, and the domain must
/// end in a top-level label of at least two letters or an `xn--` punycode
/// label, so single-label hosts such as `a@b` do not pass. Underscores are
/// not allowed anywhere in the domain.
pub fn is_valid_email(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_EMAIL_LENGTH || value.contains('<') {
        return false;
    }

    let Ok(address) = EmailAddress::parse_with_options(value, Default::default()) else {
        return false;
    };

    let domain = address.domain();
    !domain.contains('_') && has_top_level_label(domain)
}

fn has_top_level_label(domain: &str) -> bool {
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    is_alphabetic_label(tld) || is_punycode_label(tld)
}

fn is_alphabetic_label(label: &str) -> bool {
    label.chars().count() >= 2 && label.chars().all(char::is_alphabetic)
}

fn is_punycode_label(label: &str) -> bool {
    match strip_ascii_prefix(label, "xn--") {
        Some(encoded) => {
            encoded.len() >= 2
                && !encoded.ends_with('-')
                && encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

fn strip_ascii_prefix<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    value
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &value[prefix.len()..])
}

/// The sanitized message must contain at least one character.
pub fn is_non_empty(message: &str) -> bool {
    !message.is_empty()
}

/// Run the checks in order; the first failure wins.
pub fn validate_submission(email: &str, message: &str) -> Result<(), ValidationFailure> {
    if !is_valid_email(email) {
        return Err(ValidationFailure::MalformedEmail);
    }
    if !is_non_empty(message) {
        return Err(ValidationFailure::MalformedMessage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(is_valid_email("x@sub.domain.io"));
        assert!(is_valid_email("user@example.xn--p1ai"));
        assert!(is_valid_email("user@example.\u{440}\u{444}"));
    }

    #[test]
    fn test_punycode_tld_must_be_well_formed() {
        assert!(!is_valid_email("user@example.xn--"));
        assert!(!is_valid_email("user@example.xn--p1ai-"));
        assert!(!is_valid_email("user@example.xn--p1\u{e4}i"));
    }

    #[test]
    fn test_underscore_in_domain_rejected() {
        assert!(!is_valid_email("user@exa_mple.com"));
        assert!(!is_valid_email("user@mail.example_tld.com"));
        assert!(is_valid_email("first_last@example.com"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@example.c"));
        assert!(!is_valid_email("user@example.123"));
        assert!(!is_valid_email("user@[127.0.0.1]"));
    }

    #[test]
    fn test_display_name_form_rejected() {
        assert!(!is_valid_email("Someone <user@example.com>"));
    }

    #[test]
    fn test_overlong_email_rejected() {
        let local = "a".repeat(60);
        let domain = format!("{}.com", "b".repeat(200));
        assert!(!is_valid_email(&format!("{local}@{domain}")));
    }

    #[test]
    fn test_is_non_empty() {
        assert!(is_non_empty("hello"));
        assert!(!is_non_empty(""));
    }

    #[test]
    fn test_email_checked_before_message() {
        assert_eq!(
            validate_submission("bad", ""),
            Err(ValidationFailure::MalformedEmail)
        );
        assert_eq!(
            validate_submission("user@example.com", ""),
            Err(ValidationFailure::MalformedMessage)
        );
        assert_eq!(validate_submission("user@example.com", "Hello there"), Ok(()));
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(ValidationFailure::MalformedEmail.code(), "MALFORMED_EMAIL");
        assert_eq!(ValidationFailure::MalformedMessage.to_string(), "MALFORMED_MESSAGE");
    }
}
