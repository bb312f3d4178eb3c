//! Pattern compilation: optional-segment expansion, per-segment filters and the
//! compiled segment matcher.
//!
//! Patterns use `/`-delimited segments:
//!
//! - `users` - a literal segment, compared case-insensitively
//! - `:id` - a dynamic capture
//! - `:id?` - an optional capture, expanded into explicit alternatives before compiling
//! - `*rest` - a trailing splat capturing the remainder of the path (last segment only)

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maximum number of captured parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Inline parameter storage for match results.
///
/// Names are `Arc<str>` shared with the compiled route; values are per-location.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

#[allow(clippy::expect_used)]
static OPTIONAL_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/?:[^/]+)\?").expect("Failed to compile optional regex"));

#[allow(clippy::expect_used)]
static ADJACENT_OPTIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/:[^/]+)\?").expect("Failed to compile optional regex"));

/// Filter applied to a dynamic capture before it is accepted.
#[derive(Clone)]
pub enum MatchFilter {
    /// Case-insensitive equality with a single string
    Exact(String),
    /// Case-insensitive equality with any string of the list
    OneOf(Vec<String>),
    /// Regular expression test
    Regex(Regex),
    /// Arbitrary predicate
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl MatchFilter {
    /// Build a predicate filter.
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        MatchFilter::Predicate(Arc::new(f))
    }

    /// Test `input` against this filter.
    #[must_use]
    pub fn test(&self, input: &str) -> bool {
        match self {
            MatchFilter::Exact(s) => eq_ignore_case(s, input),
            MatchFilter::OneOf(list) => list.iter().any(|s| eq_ignore_case(s, input)),
            MatchFilter::Regex(re) => re.is_match(input),
            MatchFilter::Predicate(f) => f(input),
        }
    }
}

impl fmt::Debug for MatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFilter::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            MatchFilter::OneOf(list) => f.debug_tuple("OneOf").field(list).finish(),
            MatchFilter::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            MatchFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Filters keyed by capture name.
pub type MatchFilters = HashMap<String, MatchFilter>;

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Expand every `:name?` segment into explicit alternatives.
///
/// Adjacent optionals are expanded incrementally, left to right, so earlier
/// parameters always take precedence and no two expansions are equivalent:
/// `/:a?/:b?` yields `["/", "/:a", "/:a/:b"]`, never `/:b`.
///
/// ```
/// use brrtnav::router::expand_optionals;
///
/// assert_eq!(expand_optionals("/:a?/:b?/c"), vec!["/c", "/:a/c", "/:a/:b/c"]);
/// ```
#[must_use]
pub fn expand_optionals(pattern: &str) -> Vec<String> {
    expand(pattern)
        .into_iter()
        .map(|p| if p.is_empty() { "/".to_string() } else { p })
        .collect()
}

fn expand(pattern: &str) -> Vec<String> {
    let Some(caps) = OPTIONAL_SEGMENT.captures(pattern) else {
        return vec![pattern.to_string()];
    };
    let (Some(whole), Some(segment)) = (caps.get(0), caps.get(1)) else {
        return vec![pattern.to_string()];
    };

    let mut prefix = pattern[..whole.start()].to_string();
    let mut suffix = &pattern[whole.end()..];
    let mut prefixes = vec![prefix.clone()];
    prefix.push_str(segment.as_str());
    prefixes.push(prefix.clone());

    while let Some(next) = ADJACENT_OPTIONAL.captures(suffix) {
        let (Some(all), Some(seg)) = (next.get(0), next.get(1)) else {
            break;
        };
        prefix.push_str(seg.as_str());
        prefixes.push(prefix.clone());
        suffix = &suffix[all.end()..];
    }

    expand(suffix)
        .into_iter()
        .flat_map(|expansion| {
            prefixes
                .iter()
                .map(move |p| format!("{p}{expansion}"))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Percent-escape literal segments of a pattern, leaving `:` and `*` segments verbatim.
#[must_use]
pub fn escape_pattern(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if s.starts_with(':') || s.starts_with('*') {
                s.to_string()
            } else {
                urlencoding::encode(s).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Result of matching one compiled pattern against a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The portion of the location consumed by the pattern (`/` for an empty pattern)
    pub path: String,
    /// Captured parameters in pattern order
    pub params: ParamVec,
}

/// Compiled matcher for a single normalized pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    segments: Vec<Arc<str>>,
    /// `None` without splat, `Some("")` for a bare `*`, `Some(name)` for `*name`
    splat: Option<Arc<str>>,
    partial: bool,
    filters: Arc<MatchFilters>,
}

impl PathMatcher {
    /// Compile `pattern`. With `partial`, locations may carry trailing segments
    /// beyond the pattern (they are consumed by nested routes).
    #[must_use]
    pub fn new(pattern: &str, partial: bool, filters: Arc<MatchFilters>) -> Self {
        let (head, splat) = match pattern.split_once("/*") {
            Some((head, splat)) => (head, Some(Arc::from(splat))),
            None => (pattern, None),
        };
        let segments = head
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Arc::from)
            .collect();
        Self {
            segments,
            splat,
            partial,
            filters,
        }
    }

    /// Names of every capture this matcher can produce, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Arc<str>> {
        let mut keys: Vec<Arc<str>> = self
            .segments
            .iter()
            .filter_map(|s| s.strip_prefix(':').map(Arc::from))
            .collect();
        if let Some(splat) = self.splat.as_ref().filter(|s| !s.is_empty()) {
            keys.push(Arc::clone(splat));
        }
        keys
    }

    /// Number of non-splat segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Match `location` (a pathname) against the pattern.
    #[must_use]
    pub fn matches(&self, location: &str) -> Option<PathMatch> {
        let loc_segments: SmallVec<[&str; 16]> =
            location.split('/').filter(|s| !s.is_empty()).collect();
        let len = self.segments.len();
        if loc_segments.len() < len
            || (loc_segments.len() > len && self.splat.is_none() && !self.partial)
        {
            return None;
        }

        let mut path = if len == 0 {
            String::from("/")
        } else {
            String::with_capacity(location.len())
        };
        let mut params = ParamVec::new();

        for (segment, loc_segment) in self.segments.iter().zip(loc_segments.iter()) {
            if let Some(key) = segment.strip_prefix(':') {
                let accepted = self
                    .filters
                    .get(key)
                    .map_or(true, |filter| filter.test(loc_segment));
                if !accepted {
                    return None;
                }
                params.push((Arc::from(key), (*loc_segment).to_string()));
            } else if !eq_ignore_case(segment, loc_segment) {
                return None;
            }
            path.push('/');
            path.push_str(loc_segment);
        }

        if let Some(splat) = self.splat.as_ref().filter(|s| !s.is_empty()) {
            let remainder = loc_segments[len..].join("/");
            let accepted = self
                .filters
                .get(splat.as_ref())
                .map_or(true, |filter| filter.test(&remainder));
            if !accepted {
                return None;
            }
            params.push((Arc::clone(splat), remainder));
        }

        Some(PathMatch { path, params })
    }
}

/// Specificity of a pattern: 3 per static segment, 2 per dynamic segment, on top of
/// the segment count minus one when a splat is present.
#[must_use]
pub fn score_pattern(pattern: &str) -> i64 {
    let (head, has_splat) = match pattern.split_once("/*") {
        Some((head, _)) => (head, true),
        None => (pattern, false),
    };
    let segments: Vec<&str> = head.split('/').filter(|s| !s.is_empty()).collect();
    let initial = segments.len() as i64 - i64::from(has_splat);
    segments.iter().fold(initial, |score, segment| {
        score + if segment.starts_with(':') { 2 } else { 3 }
    })
}
