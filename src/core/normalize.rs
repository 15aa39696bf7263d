//! Member name → view-state key conversion.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._\-]([a-z])").expect("separator pattern"));

/// Convert a dotted, snake or kebab member name into its camel-case key.
///
/// Only a separator followed by a lowercase letter is folded; anything else is
/// left alone, so the transform is idempotent.
pub fn normalize(name: &str) -> String {
    SEPARATOR
        .replace_all(name, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

/// The key a member is watched under, scoped by the statement alias when there is one.
pub fn full_key(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, normalize(name)),
        _ => normalize(name),
    }
}

/// Extract the alias from a declaration such as `"WidgetController as w"`.
///
/// The delimiter is matched ASCII case-insensitively. Returns `None` when it is
/// missing or nothing follows it.
pub fn statement_name(declaration: &str, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }
    // ASCII lowering keeps byte offsets aligned with the original text
    let idx = declaration
        .to_ascii_lowercase()
        .find(&delimiter.to_ascii_lowercase())?;
    let alias = declaration[idx + delimiter.len()..].trim();
    if alias.is_empty() {
        None
    } else {
        Some(alias.to_string())
    }
}

/// The construct name in front of the delimiter, or the whole declaration.
pub fn statement_target<'a>(declaration: &'a str, delimiter: &str) -> &'a str {
    let lowered = declaration.to_ascii_lowercase();
    match lowered.find(&delimiter.to_ascii_lowercase()) {
        Some(idx) if !delimiter.is_empty() => declaration[..idx].trim(),
        _ => declaration.trim(),
    }
}
