//! String utility functions.

use regex::Regex;
use std::sync::OnceLock;

/// Converts a `CamelCase` identifier to `snake_case`.
///
/// Runs of capitals are treated as one word, so acronyms stay together.
///
/// # Examples
///
/// ```
/// use utkik_core::utils::text::uncamel;
///
/// assert_eq!(uncamel("CamelCase"), "camel_case");
/// assert_eq!(uncamel("getHTTPResponseCode"), "get_http_response_code");
/// assert_eq!(uncamel("PostListView"), "post_list_view");
/// ```
pub fn uncamel(s: &str) -> String {
    static WORD_START: OnceLock<Regex> = OnceLock::new();
    static LOWER_UPPER: OnceLock<Regex> = OnceLock::new();

    let word_start = WORD_START.get_or_init(|| Regex::new(r"(.)([A-Z][a-z]+)").unwrap());
    let lower_upper = LOWER_UPPER.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

    let s = word_start.replace_all(s, "${1}_${2}");
    let s = lower_upper.replace_all(&s, "${1}_${2}");
    s.to_lowercase()
}
