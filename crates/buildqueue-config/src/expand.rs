//! Environment variable expansion for configured paths.
//!
//! Supports `$VAR`, `${VAR}` and a leading `~`. Unknown variables are left
//! untouched so that a typo shows up verbatim in the resulting path.

use regex::{Captures, Regex};
use std::path::PathBuf;
use std::sync::LazyLock;

static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}|\$([a-zA-Z_][a-zA-Z0-9_]*)").unwrap()
});

/// Expand variables in `raw` using the process environment.
pub fn expand_path(raw: &str) -> PathBuf {
    expand_with(raw, |name| std::env::var(name).ok())
}

/// Expand variables in `raw` using `lookup` to resolve names.
pub fn expand_with<F>(raw: &str, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = VAR_REGEX.replace_all(raw, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });

    if expanded == "~" || expanded.starts_with("~/") {
        if let Some(home) = lookup("HOME") {
            return PathBuf::from(format!("{}{}", home, &expanded[1..]));
        }
    }

    PathBuf::from(expanded.into_owned())
}
