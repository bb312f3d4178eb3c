//! Path string utilities shared by the compiler, the matcher and the navigator.
//!
//! These mirror the URL rules every history backend agrees on: leading slashes are
//! collapsed, a trailing run of slashes collapses to one, and anything carrying a
//! scheme (`https://`, `//host`) is not routable.

use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static HAS_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[a-z0-9]+:)?//").expect("Failed to compile scheme regex"));

#[allow(clippy::expect_used)]
static SPLAT_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/*(\*.*)?$").expect("Failed to compile splat regex"));

/// Normalize a path fragment.
///
/// Leading slashes are removed, a trailing run of two or more slashes becomes a
/// single slash, and the result is re-rooted with `/` unless `omit_slash` is set or
/// the fragment is a bare query (`?`) or hash (`#`). Empty input yields `""`.
#[must_use]
pub fn normalize_path(path: &str, omit_slash: bool) -> String {
    let s = path.trim_start_matches('/');
    let body = s.trim_end_matches('/');
    let s = if s.len() - body.len() >= 2 {
        format!("{body}/")
    } else {
        s.to_string()
    };

    if s.is_empty() {
        String::new()
    } else if omit_slash || s.starts_with('?') || s.starts_with('#') {
        s
    } else {
        format!("/{s}")
    }
}

/// Resolve `path` against a base path and, for relative targets, the path of the
/// route doing the resolving.
///
/// Returns `None` when `path` carries a scheme or is protocol-relative.
///
/// ```
/// use brrtnav::router::resolve_path;
///
/// assert_eq!(resolve_path("", "/users/42", None).as_deref(), Some("/users/42"));
/// assert_eq!(resolve_path("/app", "settings", Some("/users")).as_deref(), Some("/app/users/settings"));
/// assert_eq!(resolve_path("", "https://example.com", None), None);
/// ```
#[must_use]
pub fn resolve_path(base: &str, path: &str, from: Option<&str>) -> Option<String> {
    if HAS_SCHEME.is_match(path) {
        return None;
    }

    let base_path = normalize_path(base, false);
    let from_path = from.map(|f| normalize_path(f, false)).unwrap_or_default();

    let result = if from_path.is_empty() || path.starts_with('/') {
        base_path
    } else if !from_path
        .to_lowercase()
        .starts_with(&base_path.to_lowercase())
    {
        format!("{base_path}{from_path}")
    } else {
        from_path
    };

    let tail = normalize_path(path, result.is_empty());
    let head = if result.is_empty() { "/".to_string() } else { result };
    Some(format!("{head}{tail}"))
}

/// Join a parent pattern and a child pattern, dropping any trailing slashes and splat
/// from the parent first.
#[must_use]
pub fn join_paths(from: &str, to: &str) -> String {
    let from = normalize_path(from, false);
    let head = SPLAT_TAIL.replace_all(&from, "");
    format!("{head}{}", normalize_path(to, false))
}

/// Apply `updates` to a search string.
///
/// A `None` or empty value deletes the key; anything else replaces every
/// occurrence of the key with a single pair. Returns `""` when no pairs remain,
/// otherwise the encoded string prefixed with `?`.
#[must_use]
pub fn merge_search_string(search: &str, updates: &[(&str, Option<&str>)]) -> String {
    let mut pairs: Vec<(String, String)> =
        url::form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect();

    for (key, value) in updates {
        match value {
            Some(v) if !v.is_empty() => {
                if let Some(pos) = pairs.iter().position(|(k, _)| k == key) {
                    pairs[pos].1 = (*v).to_string();
                    let mut idx = 0;
                    pairs.retain(|(k, _)| {
                        let keep = k != key || idx == pos;
                        idx += 1;
                        keep
                    });
                } else {
                    pairs.push(((*key).to_string(), (*v).to_string()));
                }
            }
            _ => pairs.retain(|(k, _)| k != key),
        }
    }

    if pairs.is_empty() {
        return String::new();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    format!("?{encoded}")
}
