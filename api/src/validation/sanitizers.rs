//! Input sanitization functions
//!
//! Free-text fields pass through an ordered [`Pipeline`] of named
//! [`SanitizeStep`]s. Every step is a plain string transformation and can be
//! exercised on its own.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Heart glyph substituted for the `<3` emoticon.
pub const HEART: &str = "\u{2661}";

/// Escaped form of `<3` that survives markup stripping as text.
const ESCAPED_HEART: &str = "&lt;3";

const ELLIPSIS: char = '\u{2026}';

/// Default display budget for auto-linked URLs, in characters.
pub const DEFAULT_LINK_TRUNCATE: usize = 60;

/// Elements whose text content is dropped along with the tags.
const DISCARDED_CONTENT_TAGS: [&str; 5] = ["script", "style", "textarea", "option", "noscript"];

lazy_static! {
    /// Any newline convention: CRLF, LFCR, lone CR or lone LF
    static ref LINE_BREAK_PATTERN: Regex = Regex::new(r"\r\n|\n\r|\r|\n").unwrap();

    /// Bare URLs with an explicit scheme or a `www.` prefix. Input is already
    /// HTML-escaped, so `&amp;` is the only entity a URL may contain; any
    /// other entity (`&lt;`, `&gt;`, `&nbsp;`) ends the match.
    static ref URL_PATTERN: Regex =
        Regex::new(r#"(?i)\b(?:https?://|www\.)(?:[^\s<>"'&]|&amp;)+"#).unwrap();

    /// A single character reference, counted as one visible character
    static ref ENTITY_PATTERN: Regex =
        Regex::new(r"&(?:[a-zA-Z][a-zA-Z0-9]*|#[0-9]+|#[xX][0-9a-fA-F]+);").unwrap();

    /// Scheme prefix stripped from link display text
    static ref SCHEME_PREFIX: Regex = Regex::new(r"(?i)^https?://").unwrap();
}

/// One named transformation over a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeStep {
    EscapeHeart,
    Trim,
    StripMarkup,
    RestoreHeart,
    LineBreaks,
    AutoLink { truncate: usize },
}

impl SanitizeStep {
    pub fn name(&self) -> &'static str {
        match self {
            SanitizeStep::EscapeHeart => "escape_heart",
            SanitizeStep::Trim => "trim",
            SanitizeStep::StripMarkup => "strip_markup",
            SanitizeStep::RestoreHeart => "restore_heart",
            SanitizeStep::LineBreaks => "line_breaks",
            SanitizeStep::AutoLink { .. } => "auto_link",
        }
    }

    pub fn apply(&self, input: &str) -> String {
        match *self {
            SanitizeStep::EscapeHeart => escape_heart(input),
            SanitizeStep::Trim => input.trim().to_string(),
            SanitizeStep::StripMarkup => strip_markup(input),
            SanitizeStep::RestoreHeart => restore_heart(input),
            SanitizeStep::LineBreaks => convert_line_breaks(input),
            SanitizeStep::AutoLink { truncate } => auto_link(input, truncate),
        }
    }
}

/// Switches for the optional message steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizerOptions {
    pub line_breaks: bool,
    pub auto_link: bool,
    pub link_truncate: usize,
}

impl Default for SanitizerOptions {
    fn default() -> Self {
        Self {
            line_breaks: true,
            auto_link: true,
            link_truncate: DEFAULT_LINK_TRUNCATE,
        }
    }
}

/// Ordered sequence of steps applied left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<SanitizeStep>,
}

impl Pipeline {
    pub fn new(steps: Vec<SanitizeStep>) -> Self {
        Self { steps }
    }

    /// The language code is only a lookup key, so it gets markup stripping
    /// and trimming and nothing else.
    pub fn language() -> Self {
        Self::new(vec![
            SanitizeStep::Trim,
            SanitizeStep::StripMarkup,
            SanitizeStep::Trim,
        ])
    }

    pub fn message(options: &SanitizerOptions) -> Self {
        let mut steps = vec![
            SanitizeStep::EscapeHeart,
            SanitizeStep::Trim,
            SanitizeStep::StripMarkup,
            SanitizeStep::RestoreHeart,
        ];
        if options.line_breaks {
            steps.push(SanitizeStep::LineBreaks);
        }
        if options.auto_link {
            steps.push(SanitizeStep::AutoLink {
                truncate: options.link_truncate,
            });
        }
        Self::new(steps)
    }

    pub fn steps(&self) -> &[SanitizeStep] {
        &self.steps
    }

    pub fn run(&self, input: &str) -> String {
        self.steps
            .iter()
            .fold(input.to_string(), |value, step| step.apply(&value))
    }
}

/// Both field pipelines, built once from configuration.
#[derive(Debug, Clone)]
pub struct FieldSanitizer {
    language: Pipeline,
    message: Pipeline,
}

impl FieldSanitizer {
    pub fn new(options: &SanitizerOptions) -> Self {
        Self {
            language: Pipeline::language(),
            message: Pipeline::message(options),
        }
    }

    pub fn language(&self, raw: &str) -> String {
        self.language.run(raw)
    }

    pub fn message(&self, raw: &str) -> String {
        self.message.run(raw)
    }

    pub fn message_pipeline(&self) -> &Pipeline {
        &self.message
    }
}

impl Default for FieldSanitizer {
    fn default() -> Self {
        Self::new(&SanitizerOptions::default())
    }
}

/// Replace `<3` with its escaped form so markup stripping keeps it.
pub fn escape_heart(value: &str) -> String {
    value.replace("<3", ESCAPED_HEART)
}

/// Turn the escaped heart back into a glyph.
pub fn restore_heart(value: &str) -> String {
    value.replace(ESCAPED_HEART, HEART)
}

/// Remove every tag and attribute, keeping text content. The content of
/// script-like elements is dropped entirely. Text is returned HTML-escaped.
pub fn strip_markup(value: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(HashSet::new())
        .tag_attributes(HashMap::new())
        .generic_attributes(HashSet::new())
        .link_rel(None)
        .clean_content_tags(DISCARDED_CONTENT_TAGS.iter().copied().collect());
    builder.clean(value).to_string()
}

/// Convert every newline sequence into a `<br>` element.
pub fn convert_line_breaks(value: &str) -> String {
    LINE_BREAK_PATTERN.replace_all(value, "<br>").into_owned()
}

/// Wrap bare URLs in anchors. The display text drops the scheme, a leading
/// `www.` and a trailing slash, then is cut to `truncate` characters.
pub fn auto_link(value: &str, truncate: usize) -> String {
    URL_PATTERN
        .replace_all(value, |caps: &Captures| {
            let (url, trailing) = split_trailing_punctuation(&caps[0]);
            format!("{}{}", render_anchor(url, truncate), trailing)
        })
        .into_owned()
}

fn render_anchor(url: &str, truncate: usize) -> String {
    let href = if SCHEME_PREFIX.is_match(url) {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    let display = truncate_smart(&display_text(url), truncate);
    format!(r#"<a href="{href}" target="_blank" rel="noopener noreferrer">{display}</a>"#)
}

fn display_text(url: &str) -> String {
    let without_scheme = SCHEME_PREFIX.replace(url, "");
    let without_www = strip_prefix_ignore_case(&without_scheme, "www.");
    without_www
        .strip_suffix('/')
        .unwrap_or(without_www)
        .to_string()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> &'a str {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &value[prefix.len()..],
        _ => value,
    }
}

/// Sentence punctuation directly after a URL belongs to the prose. A
/// closing parenthesis is kept when it balances one inside the URL.
fn split_trailing_punctuation(matched: &str) -> (&str, &str) {
    let mut end = matched.len();
    while let Some(last) = matched[..end].chars().next_back() {
        let strip = match last {
            ';' => !matched[..end].ends_with("&amp;"),
            '.' | ',' | ':' | '!' | '?' => true,
            ')' => {
                let candidate = &matched[..end];
                candidate.matches(')').count() > candidate.matches('(').count()
            }
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    matched.split_at(end)
}

/// Shorten link text to at most `budget` characters, ellipsis included.
///
/// The host is kept intact whenever it fits; the cut is placed in the
/// middle of the remaining path so both its start and its end stay
/// visible. A host that alone exceeds the budget is cut at the end.
/// Character references such as `&amp;` count as one character and are
/// never split.
pub fn truncate_smart(text: &str, budget: usize) -> String {
    let units = display_units(text);
    if units.len() <= budget {
        return text.to_string();
    }
    if budget <= 1 {
        return units[..budget].concat();
    }

    let available = budget - 1;
    let host_len = units
        .iter()
        .position(|unit| *unit == "/")
        .unwrap_or(units.len());

    if host_len >= available {
        let mut out = units[..available].concat();
        out.push(ELLIPSIS);
        return out;
    }

    let remaining = available - host_len;
    let head = remaining.div_ceil(2);
    let tail = remaining - head;

    let mut out = units[..host_len + head].concat();
    out.push(ELLIPSIS);
    out.push_str(&units[units.len() - tail..].concat());
    out
}

/// Split text into visible characters, keeping each entity whole.
fn display_units(text: &str) -> Vec<&str> {
    let mut units = Vec::with_capacity(text.len());
    let mut last = 0;
    for entity in ENTITY_PATTERN.find_iter(text) {
        push_chars(&mut units, &text[last..entity.start()]);
        units.push(entity.as_str());
        last = entity.end();
    }
    push_chars(&mut units, &text[last..]);
    units
}

fn push_chars<'a>(units: &mut Vec<&'a str>, text: &'a str) {
    units.extend(
        text.char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor_text(html: &str) -> &str {
        let start = html.find("\">").expect("anchor open") + 2;
        let end = html.find("</a>").expect("anchor close");
        &html[start..end]
    }

    #[test]
    fn test_strip_markup_removes_tags_and_attributes() {
        assert_eq!(strip_markup("<b>bold</b> text"), "bold text");
        assert_eq!(
            strip_markup(r#"<p onclick="steal()" class="x">hi</p>"#),
            "hi"
        );
        assert_eq!(strip_markup(r#"<a href="javascript:x()">link</a>"#), "link");
        assert_eq!(strip_markup("<img src=x onerror=alert(1)>"), "");
    }

    #[test]
    fn test_strip_markup_drops_script_content() {
        assert_eq!(strip_markup("<script>alert('xss')</script>"), "");
        assert_eq!(strip_markup("a<style>body{}</style>b"), "ab");
    }

    #[test]
    fn test_strip_markup_keeps_plain_text() {
        assert_eq!(strip_markup("no tags here"), "no tags here");
    }

    #[test]
    fn test_heart_survives_pipeline() {
        let sanitizer = FieldSanitizer::default();
        assert_eq!(sanitizer.message("I <3 Rust"), format!("I {HEART} Rust"));
        assert_eq!(sanitizer.message("<3"), HEART);
    }

    #[test]
    fn test_escape_and_restore_heart() {
        assert_eq!(escape_heart("a <3 b <3"), "a &lt;3 b &lt;3");
        assert_eq!(restore_heart("a &lt;3 b"), format!("a {HEART} b"));
    }

    #[test]
    fn test_convert_line_breaks() {
        assert_eq!(convert_line_breaks("a\r\nb"), "a<br>b");
        assert_eq!(convert_line_breaks("a\n\rb"), "a<br>b");
        assert_eq!(convert_line_breaks("a\rb\nc"), "a<br>b<br>c");
        assert_eq!(convert_line_breaks("a\n\nb"), "a<br><br>b");
    }

    #[test]
    fn test_auto_link_wraps_url() {
        let html = auto_link("see https://example.com/docs now", 60);
        assert_eq!(
            html,
            r#"see <a href="https://example.com/docs" target="_blank" rel="noopener noreferrer">example.com/docs</a> now"#
        );
    }

    #[test]
    fn test_auto_link_www_gets_scheme() {
        let html = auto_link("www.rust-lang.org/", 60);
        assert!(html.contains(r#"href="http://www.rust-lang.org/""#));
        assert_eq!(anchor_text(&html), "rust-lang.org");
    }

    #[test]
    fn test_auto_link_leaves_trailing_punctuation() {
        let html = auto_link("Go to https://example.com.", 60);
        assert!(html.ends_with("</a>."));
        assert!(html.contains(r#"href="https://example.com""#));
    }

    #[test]
    fn test_auto_link_keeps_balanced_parenthesis() {
        let html = auto_link("(https://en.wikipedia.org/wiki/Rust_(language))", 60);
        assert!(html.contains(r#"href="https://en.wikipedia.org/wiki/Rust_(language)""#));
        assert!(html.ends_with("</a>)"));
    }

    #[test]
    fn test_auto_link_truncates_display_text() {
        let long = format!("https://example.com/{}", "segment/".repeat(20));
        let html = auto_link(&long, 60);
        let text = anchor_text(&html);
        assert_eq!(text.chars().count(), 60);
        assert!(text.starts_with("example.com/"));
        assert!(text.contains(ELLIPSIS));
        assert!(html.contains(&format!(r#"href="{long}""#)));
    }

    #[test]
    fn test_truncate_smart_short_text_unchanged() {
        assert_eq!(truncate_smart("example.com/a", 60), "example.com/a");
    }

    #[test]
    fn test_truncate_smart_keeps_path_ends() {
        let out = truncate_smart("example.com/abcdefghijklmnop", 20);
        assert_eq!(out.chars().count(), 20);
        assert_eq!(out, "example.com/abc\u{2026}mnop");
    }

    #[test]
    fn test_auto_link_stops_at_escaped_angle_bracket() {
        let html = auto_link("see https://example.com&gt;", 20);
        assert_eq!(
            html,
            r#"see <a href="https://example.com" target="_blank" rel="noopener noreferrer">example.com</a>&gt;"#
        );

        let html = auto_link("&lt;https://example.com/a&gt;", 60);
        assert!(html.starts_with("&lt;<a href=\"https://example.com/a\""));
        assert!(html.ends_with("</a>&gt;"));
    }

    #[test]
    fn test_auto_link_keeps_query_ampersands() {
        let html = auto_link("https://example.com/?a=1&amp;b=2&amp;", 60);
        assert!(html.contains(r#"href="https://example.com/?a=1&amp;b=2&amp;""#));
        assert!(html.ends_with("</a>"));
    }

    #[test]
    fn test_escaped_url_through_pipeline() {
        let sanitizer = FieldSanitizer::new(&SanitizerOptions {
            link_truncate: 20,
            ..SanitizerOptions::default()
        });
        let out = sanitizer.message("see https://example.com>");
        assert_eq!(
            out,
            r#"see <a href="https://example.com" target="_blank" rel="noopener noreferrer">example.com</a>&gt;"#
        );
    }

    #[test]
    fn test_truncate_smart_never_splits_entities() {
        let out = truncate_smart("example.com/search?a=1&amp;b=2&amp;c=3&amp;d=4&amp;e=5", 20);
        assert_eq!(out, "example.com/sea\u{2026}&amp;e=5");
        assert_eq!(display_units(&out).len(), 20);

        let out = truncate_smart("example.com/&amp;&amp;&amp;&amp;&amp;&amp;&amp;&amp;&amp;&amp;", 16);
        assert_eq!(out, "example.com/&amp;\u{2026}&amp;&amp;");
    }

    #[test]
    fn test_truncate_smart_long_host() {
        let out = truncate_smart("averyveryverylonghostname.example.com/x", 10);
        assert_eq!(out, "averyvery\u{2026}");
    }

    #[test]
    fn test_message_pipeline_order() {
        let pipeline = Pipeline::message(&SanitizerOptions::default());
        let names: Vec<_> = pipeline.steps().iter().map(SanitizeStep::name).collect();
        assert_eq!(
            names,
            vec![
                "escape_heart",
                "trim",
                "strip_markup",
                "restore_heart",
                "line_breaks",
                "auto_link"
            ]
        );
    }

    #[test]
    fn test_optional_steps_can_be_disabled() {
        let sanitizer = FieldSanitizer::new(&SanitizerOptions {
            line_breaks: false,
            auto_link: false,
            link_truncate: DEFAULT_LINK_TRUNCATE,
        });
        assert_eq!(
            sanitizer.message("line one\nhttps://example.com"),
            "line one\nhttps://example.com"
        );
        assert_eq!(sanitizer.message_pipeline().steps().len(), 4);
    }

    #[test]
    fn test_full_message_pipeline() {
        let sanitizer = FieldSanitizer::default();
        let out = sanitizer.message("  Hi <b>there</b>\nsee https://example.com  ");
        assert_eq!(
            out,
            r#"Hi there<br>see <a href="https://example.com" target="_blank" rel="noopener noreferrer">example.com</a>"#
        );
    }

    #[test]
    fn test_message_with_only_script_is_empty() {
        let sanitizer = FieldSanitizer::default();
        assert_eq!(sanitizer.message("<script>x</script>"), "");
    }

    #[test]
    fn test_language_pipeline() {
        let sanitizer = FieldSanitizer::default();
        assert_eq!(sanitizer.language("  de "), "de");
        assert_eq!(sanitizer.language("<i>en</i>"), "en");
        assert_eq!(sanitizer.language(" <b> en </b> "), "en");
    }
}
