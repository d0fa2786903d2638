//! Small text helpers shared by name derivation and partner display names.

use std::sync::LazyLock;

use regex::Regex;

static NON_LETTER_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z]+").expect("valid regex"));

/// Whether an optional string is absent or whitespace-only.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|s| s.trim().is_empty()).unwrap_or(true)
}

/// Title-case a whitespace-separated phrase: "jamie lee" → "Jamie Lee".
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case an identifier-like key: "acme_bank" → "Acme Bank".
pub fn titleize_key(key: &str) -> String {
    title_case(&key.replace(['_', '-'], " "))
}

/// Derive a human name from the local part of an email address.
///
/// Non-letter runs become spaces, the result is trimmed and title-cased.
/// Returns `None` when nothing usable remains (e.g. "12345@x.test").
pub fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default();
    let spaced = NON_LETTER_RUNS.replace_all(local, " ");
    let name = title_case(spaced.trim());
    if name.is_empty() { None } else { Some(name) }
}
