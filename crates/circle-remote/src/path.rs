//! Slash-delimited remote store paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::RemoteError;

/// Address of a value in the remote store, e.g. `users/alice/usage/2024-06-01`.
///
/// Segments are escaped on construction (`%` and `/`), so any id can be used as
/// a segment without changing the shape of the path. An empty segment is
/// stored as a lone `%`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    /// Single-segment path.
    pub fn root(segment: impl AsRef<str>) -> Self {
        Self(encode_segment(segment.as_ref()))
    }

    /// Path one level below `self`.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", self.0, encode_segment(segment.as_ref())))
    }

    /// Parse an already-encoded path (as produced by [`StorePath::as_str`]).
    pub fn parse(raw: &str) -> Result<Self, RemoteError> {
        if raw.is_empty() || raw.split('/').any(str::is_empty) {
            return Err(RemoteError::InvalidPath(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encoded segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Decoded last segment.
    pub fn key(&self) -> String {
        let last = self.0.rsplit('/').next().unwrap_or(&self.0);
        decode_segment(last)
    }

    pub fn parent(&self) -> Option<StorePath> {
        self.0
            .rfind('/')
            .map(|idx| StorePath(self.0[..idx].to_string()))
    }

    /// Strict ancestor check (`a` is an ancestor of `a/b`, not of `a` or `ab`).
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Whether a change at one path is visible from the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// Encoded remainder of `self` below `ancestor`.
    pub fn relative_to(&self, ancestor: &StorePath) -> Option<&str> {
        if ancestor.is_ancestor_of(self) {
            Some(&self.0[ancestor.0.len() + 1..])
        } else {
            None
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorePath {
    type Error = RemoteError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        StorePath::parse(&raw)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}

fn encode_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "%".to_string();
    }
    segment.replace('%', "%25").replace('/', "%2F")
}

/// Reverse of the segment escaping applied by [`StorePath::child`].
pub fn decode_segment(segment: &str) -> String {
    if segment == "%" {
        return String::new();
    }
    segment.replace("%2F", "/").replace("%25", "%")
}
