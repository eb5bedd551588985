//! Canonical resource identifiers.
//!
//! Two locators that differ only in scheme case, authority case, percent-encoding
//! or `.`/`..` path segments name the same resource, so the cache keys entries by
//! the canonical string produced here.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ResourceError;

/// A normalized `scheme:[//authority]/path[?query][#fragment]` locator.
#[derive(Clone)]
pub struct ResourceId {
    canonical: String,
    scheme: String,
    authority: Option<String>,
    path: String,
}

impl ResourceId {
    /// Parse and canonicalize a locator.
    ///
    /// Whitespace is significant: `" summary:/a"` is rejected, not trimmed.
    pub fn parse(input: &str) -> Result<Self, ResourceError> {
        if input.is_empty() {
            return Err(invalid(input, "identifier is empty"));
        }

        let Some((scheme, rest)) = input.split_once(':') else {
            return Err(invalid(input, "missing scheme"));
        };
        if !is_valid_scheme(scheme) {
            return Err(invalid(input, "scheme must start with a letter and contain only letters, digits, `+`, `-` or `.`"));
        }
        let scheme = scheme.to_ascii_lowercase();

        let (rest, fragment) = match rest.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => match after.find('/') {
                Some(slash) => (Some(after[..slash].to_ascii_lowercase()), &after[slash..]),
                None => (Some(after.to_ascii_lowercase()), ""),
            },
            None => (None, rest),
        };
        let path = normalize_path(path);

        let mut canonical = format!("{scheme}:");
        if let Some(authority) = &authority {
            canonical.push_str("//");
            canonical.push_str(authority);
        }
        canonical.push_str(&path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            canonical.push('?');
            canonical.push_str(query);
        }
        if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
            canonical.push('#');
            canonical.push_str(fragment);
        }

        Ok(Self {
            canonical,
            scheme,
            authority,
            path,
        })
    }

    /// Build an identifier from a scheme and a path.
    pub fn from_parts(scheme: &str, path: &str) -> Result<Self, ResourceError> {
        Self::parse(&format!("{scheme}:{path}"))
    }

    /// Build an identifier whose path consists of `segments`, each
    /// percent-encoded so it may contain `/` or spaces.
    pub fn from_segments(scheme: &str, segments: &[&str]) -> Result<Self, ResourceError> {
        let path: Vec<String> = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        Self::parse(&format!("{scheme}:/{}", path.join("/")))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The normalized, percent-encoded path. Always starts with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, percent-decoded.
    pub fn file_name(&self) -> Option<String> {
        let segment = self.path.rsplit('/').next().filter(|s| !s.is_empty())?;
        Some(decode_segment(segment))
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

fn invalid(input: &str, reason: &'static str) -> ResourceError {
    ResourceError::InvalidIdentifier {
        input: input.to_string(),
        reason,
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Uppercase the hex digits of every `%xx` escape, leaving everything else as is.
fn uppercase_escapes(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;
    while i < segment.len() {
        let is_escape = bytes[i] == b'%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
        if is_escape {
            out.push('%');
            out.push_str(&segment[i + 1..i + 3].to_ascii_uppercase());
            i += 3;
        } else {
            let ch_len = segment[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&segment[i..i + ch_len]);
            i += ch_len;
        }
    }
    out
}

/// Decode each segment, then resolve dot segments, drop empty segments and
/// re-encode. A segment whose escapes are not valid UTF-8 is kept verbatim
/// apart from escape case, so it never aliases a literal `%25` spelling.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        match urlencoding::decode(segment) {
            Ok(decoded) => match decoded.as_ref() {
                "." => {}
                ".." => {
                    segments.pop();
                }
                decoded => segments.push(urlencoding::encode(decoded).into_owned()),
            },
            Err(_) => segments.push(uppercase_escapes(segment)),
        }
    }
    format!("/{}", segments.join("/"))
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({:?})", self.canonical)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_locators_share_canonical_form() {
        let a = ResourceId::parse("Chat-Session-Summary:/abc/./def").unwrap();
        let b = ResourceId::parse("chat-session-summary:/abc//x/../def").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "chat-session-summary:/abc/def");
    }

    #[test]
    fn test_percent_encoding_is_normalized() {
        let encoded = ResourceId::parse("summary:/my%20session").unwrap();
        let raw = ResourceId::parse("summary:/my session").unwrap();
        assert_eq!(encoded, raw);
        assert_eq!(raw.path(), "/my%20session");
        assert_eq!(raw.file_name().as_deref(), Some("my session"));
    }

    #[test]
    fn test_authority_query_and_fragment() {
        let id = ResourceId::parse("FILE://Host/a/b?x=1#frag").unwrap();
        assert_eq!(id.scheme(), "file");
        assert_eq!(id.authority(), Some("host"));
        assert_eq!(id.path(), "/a/b");
        assert_eq!(id.to_string(), "file://host/a/b?x=1#frag");

        let bare = ResourceId::parse("file://host/a?#").unwrap();
        assert_eq!(bare.as_str(), "file://host/a");
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let id = ResourceId::from_parts("summary", "session-1").unwrap();
        assert_eq!(id.as_str(), "summary:/session-1");
    }

    #[test]
    fn test_deserialize_normalizes() {
        let id: ResourceId = serde_json::from_str(r#""Summary:/a/./b""#).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""summary:/a/b""#);
        assert!(serde_json::from_str::<ResourceId>(r#""no scheme""#).is_err());
    }

    #[test]
    fn test_segments_are_encoded() {
        let id = ResourceId::from_segments("summary", &["a/b c"]).unwrap();
        assert_eq!(id.as_str(), "summary:/a%2Fb%20c");
        assert_eq!(id.file_name().as_deref(), Some("a/b c"));
    }

    #[test]
    fn test_undecodable_escapes_stay_distinct_from_literal_percent() {
        let raw = ResourceId::parse("summary:/%ff").unwrap();
        let literal = ResourceId::parse("summary:/%25FF").unwrap();

        assert_eq!(raw.as_str(), "summary:/%FF");
        assert_eq!(literal.as_str(), "summary:/%25FF");
        assert_ne!(raw, literal);
        assert_eq!(ResourceId::parse(raw.as_str()).unwrap(), raw);
    }

    #[test]
    fn test_encoded_dot_segments_resolve_like_plain_ones() {
        let id = ResourceId::parse("summary:/a/%2E%2E/b/%2e").unwrap();
        assert_eq!(id.as_str(), "summary:/b");

        for input in ["summary:/a/%2E%2E", "summary:/a/%2E", "summary:/%2E%2E%2E", "summary:/%FF/../x"] {
            let id = ResourceId::parse(input).unwrap();
            assert_eq!(ResourceId::parse(id.as_str()).unwrap(), id, "{input}");

            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(serde_json::from_str::<ResourceId>(&json).unwrap(), id, "{input}");
        }
    }

    #[test]
    fn test_whitespace_is_not_trimmed() {
        assert!(ResourceId::parse(" summary:/a").is_err());

        let padded = ResourceId::parse("summary:/a ").unwrap();
        assert_ne!(padded, ResourceId::parse("summary:/a").unwrap());
    }

    #[test]
    fn test_rejects_malformed_identifiers() {
        for input in ["", "   ", "no-scheme-here", "1abc:/x", ":/x", "a b:/x", " summary:/x"] {
            let err = ResourceId::parse(input).unwrap_err();
            assert!(
                matches!(err, ResourceError::InvalidIdentifier { .. }),
                "expected InvalidIdentifier for {input:?}, got {err:?}"
            );
        }
    }
}
