//! # Text Processing Utilities
//!
//! Redaction of credentials before text reaches the logs, escaping of generated
//! summaries for the downstream renderer, and length-only descriptions of
//! patient text so transcripts never land in log output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Redacts values that look like secrets in a string.
///
/// Authorization headers, bearer/basic credentials, credential-named
/// assignments (`API_KEY=...`, `"token": "..."`), cloud access key ids and
/// URL user-info are replaced with `[REDACTED]`, keeping key names intact.
///
/// # Example
/// ```rust
/// use visitnote_util::redact_sensitive;
///
/// let redacted = redact_sensitive("API_KEY=abc123 TOKEN=xyz789");
/// assert_eq!(redacted, "API_KEY=[REDACTED] TOKEN=[REDACTED]");
///
/// let redacted = redact_sensitive("Authorization: Bearer secret123");
/// assert_eq!(redacted, "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in get_redact_patterns().iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let value = captures.get(2);
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                if value.is_some() {
                    format!("{}{}{}", prefix, replacement, suffix)
                } else {
                    replacement.to_string()
                }
            })
            .to_string();
    }

    redacted
}

/// Redacts every string inside a JSON value.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(redact_sensitive(text)),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map.iter() {
                out.insert(key.clone(), redact_json(item));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Returns compiled regex patterns for detecting sensitive information.
///
/// Ordered from most specific to most general.
pub fn get_redact_patterns() -> &'static Vec<Regex> {
    static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

    &REDACT_PATTERNS
}

fn build_redact_patterns() -> Vec<Regex> {
    let mut patterns = Vec::new();

    patterns.extend(build_authorization_patterns());
    patterns.extend(build_cloud_credential_patterns());
    patterns.extend(build_assignment_patterns());

    patterns
}

/// Captures authorization headers and inline bearer/basic credentials.
fn build_authorization_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s]+)*)").unwrap(),
        Regex::new(r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)").unwrap(),
        Regex::new(r"(?i)((?:^|\b)Basic\s+)([A-Za-z0-9+/]+=*)").unwrap(),
        Regex::new(r"(?i)(x-api-key:\s+)([^\s]+)").unwrap(),
    ]
}

fn build_cloud_credential_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"\b((?:AKIA|ASIA)[0-9A-Z]{16})\b").unwrap(),
        Regex::new(r"(https?://)([^/\s:@]+:[^/\s@]+)(@)").unwrap(),
    ]
}

fn build_assignment_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)").unwrap(),
        Regex::new(r#"(?i)("(?:api[_-]?key|token|secret|password)"\s*:\s*")([^"]+)(")"#).unwrap(),
    ]
}

/// Escape characters the summary renderer treats as markup.
///
/// The renderer interprets `$` as a math delimiter, so every `$` becomes `\$`.
///
/// ```rust
/// use visitnote_util::escape_summary_markup;
///
/// assert_eq!(escape_summary_markup("co-pay is $20"), "co-pay is \\$20");
/// ```
pub fn escape_summary_markup(text: &str) -> String {
    text.replace('$', "\\$")
}

/// Describe patient text for logging without revealing its contents.
pub fn describe_text(text: &str) -> String {
    let characters = text.chars().count();
    let words = text.split_whitespace().count();
    format!("{characters} chars, {words} words")
}
