//! Route template compilation.
//!
//! A route template is a plain string with two segment kinds: literal text,
//! taken verbatim, and dynamic segments written `{name:(pattern)}`, where
//! `name` becomes a capture and `pattern` is a regex fragment matching the
//! segment's value. `details/get/{id:([0-9]+)}` compiles to a pattern that
//! matches `details/get/42` and captures `id = "42"`.
//!
//! Literal text is not escaped — it flows into the compiled regex unchanged,
//! so a template may use regex syntax outside dynamic segments (a trailing
//! `?` after a segment makes it optional, which the bundled directory-listing
//! tool relies on). The stored pattern source carries no anchors; anchoring
//! to the full path happens only when matching.

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

/// Route construction failures. Surfaced when a plug is built or mounted,
/// never per request.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route template `{template}`: {source}")]
    BadTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// Named values captured from a matched path.
///
/// # Examples
///
/// ```
/// use plugweb::route::UrlParams;
///
/// let mut params = UrlParams::new();
/// params.insert("id", "42");
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    map: HashMap<String, String>,
}

impl UrlParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a captured value, replacing any previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    /// Returns the captured value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Returns the number of captured values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for UrlParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// A compiled route template: the unanchored pattern source, the anchored
/// matcher, and the capture names in order of appearance.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    captures: Vec<String>,
}

impl RoutePattern {
    /// Compiles a route template.
    ///
    /// # Errors
    ///
    /// [`RouteError::BadTemplate`] when the template (a malformed dynamic
    /// subpattern, stray regex syntax in a literal) does not compile.
    pub fn compile(template: &str) -> Result<Self, RouteError> {
        let source = convert_template(template);
        let regex = Regex::new(&format!("^{source}$")).map_err(|e| RouteError::BadTemplate {
            template: template.to_owned(),
            source: e,
        })?;
        let captures = regex
            .capture_names()
            .flatten()
            .map(str::to_owned)
            .collect();
        Ok(Self {
            source,
            regex,
            captures,
        })
    }

    /// The unanchored pattern source after dynamic-segment conversion.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Capture names in order of appearance in the template.
    pub fn capture_names(&self) -> &[String] {
        &self.captures
    }

    /// Matches `path` against the full-string-anchored pattern, returning the
    /// captured values on success. Optional captures that did not participate
    /// in the match are omitted from the map.
    pub fn matches(&self, path: &str) -> Option<UrlParams> {
        let caps = self.regex.captures(path)?;
        let mut params = UrlParams::new();
        for name in &self.captures {
            if let Some(m) = caps.name(name) {
                params.insert(name.clone(), m.as_str());
            }
        }
        Some(params)
    }
}

/// Replaces every well-formed `{name:(pattern)}` segment with a named capture
/// group `(?P<name>pattern)`. Anything else is copied through untouched.
fn convert_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);
        match parse_dynamic(tail) {
            Some((name, sub, consumed)) => {
                out.push_str("(?P<");
                out.push_str(name);
                out.push('>');
                out.push_str(sub);
                out.push(')');
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a `{name:(pattern)}` segment at the start of `tail` (which begins
/// with `{`). Returns the name, the subpattern, and the number of bytes
/// consumed, or `None` when the shape does not match.
fn parse_dynamic(tail: &str) -> Option<(&str, &str, usize)> {
    let inner = tail.strip_prefix('{')?;
    let colon = inner.find(':')?;
    let name = &inner[..colon];
    if name.is_empty() || name.contains(['{', '}']) {
        return None;
    }
    let sub_inner = inner[colon + 1..].strip_prefix('(')?;
    let close = sub_inner.find(')')?;
    if !sub_inner[close + 1..].starts_with('}') {
        return None;
    }
    let sub = &sub_inner[..close];
    // `{` + name + `:` + `(` + sub + `)` + `}`
    let consumed = 1 + colon + 1 + 1 + close + 1 + 1;
    Some((name, sub, consumed))
}

/// Strips at most one leading and one trailing separator from a route
/// fragment, making declarations with or without surrounding `/` equivalent
/// once composed.
pub(crate) fn trim_fragment(fragment: &str) -> &str {
    let fragment = fragment.strip_prefix('/').unwrap_or(fragment);
    fragment.strip_suffix('/').unwrap_or(fragment)
}

/// Strips at most one trailing separator from a plug prefix. The leading
/// separator is kept: a top-level prefix addresses absolute request paths,
/// and composition re-trims when the prefix becomes a fragment of a larger
/// route.
pub(crate) fn trim_prefix(prefix: &str) -> &str {
    prefix.strip_suffix('/').unwrap_or(prefix)
}

/// Joins a route fragment under a prefix with exactly one separator between
/// them. The empty prefix is the root, yielding `/fragment`.
pub(crate) fn join(prefix: &str, fragment: &str) -> String {
    format!("{prefix}/{}", trim_fragment(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── convert_template ─────────────────────────────────────────────────────

    #[test]
    fn literal_passes_through() {
        assert_eq!(convert_template("/users/list"), "/users/list");
    }

    #[test]
    fn dynamic_segment_becomes_named_group() {
        assert_eq!(
            convert_template("details/get/{id:([0-9]+)}"),
            "details/get/(?P<id>[0-9]+)"
        );
    }

    #[test]
    fn multiple_dynamic_segments() {
        assert_eq!(
            convert_template("{a:(\\d+)}/x/{b:(\\w+)}"),
            "(?P<a>\\d+)/x/(?P<b>\\w+)"
        );
    }

    #[test]
    fn malformed_segment_stays_literal() {
        assert_eq!(convert_template("/x/{oops"), "/x/{oops");
        assert_eq!(convert_template("/x/{no_colon}"), "/x/{no_colon}");
        assert_eq!(convert_template("/x/{name:bare}"), "/x/{name:bare}");
    }

    // ── RoutePattern ─────────────────────────────────────────────────────────

    #[test]
    fn compile_extracts_capture_names_in_order() {
        let p = RoutePattern::compile("{year:([0-9]{4})}/{month:([0-9]{2})}").unwrap();
        assert_eq!(p.capture_names(), ["year", "month"]);
    }

    #[test]
    fn match_captures_substituted_values() {
        let p = RoutePattern::compile("details/get/{id:([0-9]+)}").unwrap();
        let params = p.matches("details/get/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn match_rejects_nonconforming_value() {
        let p = RoutePattern::compile("details/get/{id:([0-9]+)}").unwrap();
        assert!(p.matches("details/get/abc").is_none());
    }

    #[test]
    fn match_is_full_string_anchored() {
        let p = RoutePattern::compile("/users").unwrap();
        assert!(p.matches("/users").is_some());
        assert!(p.matches("/users/extra").is_none());
        assert!(p.matches("prefix/users").is_none());
    }

    #[test]
    fn source_carries_no_anchors() {
        let p = RoutePattern::compile("/users").unwrap();
        assert_eq!(p.source(), "/users");
    }

    #[test]
    fn optional_group_omitted_when_absent() {
        let p = RoutePattern::compile("/files/{target:([0-9a-zA-Z\\./_-]+)}?").unwrap();
        let hit = p.matches("/files/docs/readme.txt").unwrap();
        assert_eq!(hit.get("target"), Some("docs/readme.txt"));
        let bare = p.matches("/files/").unwrap();
        assert!(bare.get("target").is_none());
    }

    #[test]
    fn bad_subpattern_fails_at_compile_time() {
        let err = RoutePattern::compile("/x/{id:([0-9+)}").unwrap_err();
        assert!(matches!(err, RouteError::BadTemplate { .. }));
    }

    #[test]
    fn zero_capture_pattern_yields_empty_params() {
        let p = RoutePattern::compile("/ping").unwrap();
        let params = p.matches("/ping").unwrap();
        assert!(params.is_empty());
    }

    // ── trimming and joining ─────────────────────────────────────────────────

    #[test]
    fn join_inserts_single_separator() {
        assert_eq!(join("scope", "get"), "scope/get");
        assert_eq!(join("", "truc"), "/truc");
    }

    #[test]
    fn join_is_idempotent_over_separators() {
        assert_eq!(join("scope", "get"), join("scope", "/get"));
        assert_eq!(join("scope", "get"), join("scope", "get/"));
        assert_eq!(join("scope", "get"), join("scope", "/get/"));
    }

    #[test]
    fn prefix_keeps_leading_separator() {
        assert_eq!(trim_prefix("/files/"), "/files");
        assert_eq!(trim_prefix("files"), "files");
    }
}
