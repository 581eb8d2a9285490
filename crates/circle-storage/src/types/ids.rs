//! Strongly-typed identifiers (avoid mixing strings arbitrarily).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier, as issued by the identity provider.
///
/// Ordering is lexical; the leaderboard uses it to break usage ties.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Group identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh, time-ordered group id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_ordering_is_lexical() {
        let mut ids = vec![UserId::new("carol"), UserId::new("alice"), UserId::new("bob")];
        ids.sort();
        assert_eq!(
            ids,
            vec![UserId::new("alice"), UserId::new("bob"), UserId::new("carol")]
        );
    }

    #[test]
    fn test_generated_group_ids_are_unique() {
        let a = GroupId::generate();
        let b = GroupId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId::new("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
        let group: GroupId = serde_json::from_str("\"g-1\"").unwrap();
        assert_eq!(group, GroupId::new("g-1"));
    }

    #[test]
    fn test_display_matches_inner() {
        assert_eq!(UserId::new("abc").to_string(), "abc");
        assert_eq!(GroupId::new("xyz").to_string(), "xyz");
    }
}
