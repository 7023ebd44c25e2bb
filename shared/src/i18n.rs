/// Language used when a submission does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Localized strings for outbound mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strings {
    pub subject: &'static str,
}

const EN: Strings = Strings {
    subject: "Contact Request",
};

const DE: Strings = Strings {
    subject: "Kontaktanfrage",
};

/// Look up the strings for a language code. Keys are case-sensitive and
/// there is no fallback: an unknown code yields `None`.
pub fn strings_for(lang: &str) -> Option<&'static Strings> {
    match lang {
        "en" => Some(&EN),
        "de" => Some(&DE),
        _ => None,
    }
}

pub fn supported_languages() -> &'static [&'static str] {
    &["en", "de"]
}
