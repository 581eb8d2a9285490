//! Group records and member sets in the shared store.

use chrono::{DateTime, Utc};
use circle_remote::{RemoteError, RemoteStore};
use circle_storage::{GroupId, GroupMembership, UserId};
use dashmap::DashMap;
use futures::{future, stream, Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::paths;

/// Live member set of one group. Consecutive duplicates are suppressed.
pub type MemberStream = Pin<Box<dyn Stream<Item = BTreeSet<UserId>> + Send>>;

/// Create, join, leave and observe groups.
///
/// All mutations are idempotent. Membership misses are reported as `false`
/// rather than errors.
pub struct MembershipIndex {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<DashMap<GroupId, GroupMembership>>,
}

impl MembershipIndex {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Create a group owned by (and containing) `owner_id`.
    pub async fn create(&self, name: &str, owner_id: &UserId) -> Result<GroupId, SyncError> {
        let group_id = GroupId::generate();
        let created_at = Utc::now();

        let mut members = serde_json::Map::new();
        members.insert(owner_id.as_str().to_string(), Value::Bool(true));
        let node = json!({
            "name": name,
            "owner": owner_id.as_str(),
            "createdAt": created_at.timestamp_millis(),
            "members": members,
        });

        self.remote.write(&paths::group(&group_id), node).await?;
        self.remote
            .write(&paths::user_group(owner_id, &group_id), Value::Bool(true))
            .await?;

        self.cache.insert(
            group_id.clone(),
            GroupMembership {
                group_id: group_id.clone(),
                owner_id: owner_id.clone(),
                name: name.to_string(),
                member_ids: BTreeSet::from([owner_id.clone()]),
                created_at: Some(created_at),
            },
        );
        info!(group_id = %group_id, name, "created group");
        Ok(group_id)
    }

    /// Add `user_id` to the group. Returns `false` when the group does not exist.
    pub async fn join(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, SyncError> {
        let Some(group) = self.group(group_id).await? else {
            debug!(group_id = %group_id, "join: no such group");
            return Ok(false);
        };
        if group.is_member(user_id) {
            return Ok(true);
        }

        self.remote
            .write(&paths::group_member(group_id, user_id), Value::Bool(true))
            .await?;
        self.remote
            .write(&paths::user_group(user_id, group_id), Value::Bool(true))
            .await?;

        if let Some(mut cached) = self.cache.get_mut(group_id) {
            cached.member_ids.insert(user_id.clone());
        }
        info!(group_id = %group_id, user_id = %user_id, "joined group");
        Ok(true)
    }

    /// Remove `user_id` from the group. Returns `false` when it was not a member.
    pub async fn leave(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, SyncError> {
        let members = self.members_of(group_id).await?;
        if !members.contains(user_id) {
            return Ok(false);
        }

        self.remote
            .remove(&paths::group_member(group_id, user_id))
            .await?;
        self.remote
            .remove(&paths::user_group(user_id, group_id))
            .await?;

        if let Some(mut cached) = self.cache.get_mut(group_id) {
            cached.member_ids.remove(user_id);
        }
        info!(group_id = %group_id, user_id = %user_id, "left group");
        Ok(true)
    }

    /// Current member set. Empty when the group does not exist.
    pub async fn members_of(&self, group_id: &GroupId) -> Result<BTreeSet<UserId>, SyncError> {
        Ok(read_members(self.remote.as_ref(), group_id).await?)
    }

    /// Full group record, read from the shared store.
    pub async fn group(&self, group_id: &GroupId) -> Result<Option<GroupMembership>, SyncError> {
        let Some(node) = self.remote.read(&paths::group(group_id)).await? else {
            return Ok(None);
        };
        let group = parse_group(group_id, &node);
        if let Some(group) = &group {
            self.cache.insert(group_id.clone(), group.clone());
        }
        Ok(group)
    }

    pub async fn group_name(&self, group_id: &GroupId) -> Result<Option<String>, SyncError> {
        let name = self
            .remote
            .read(&paths::group(group_id).child("name"))
            .await?;
        Ok(name.and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Groups `user_id` belongs to, from the per-user index.
    pub async fn groups_of(&self, user_id: &UserId) -> Result<Vec<GroupId>, SyncError> {
        let index = self.remote.read(&paths::user_groups(user_id)).await?;
        Ok(truthy_keys(index.as_ref())
            .into_iter()
            .map(GroupId::new)
            .collect())
    }

    /// Last group record seen by this index, without touching the store.
    pub fn cached(&self, group_id: &GroupId) -> Option<GroupMembership> {
        self.cache.get(group_id).map(|g| g.clone())
    }

    /// Stream the member set: the current set first, then every change.
    pub async fn watch_members(&self, group_id: &GroupId) -> Result<MemberStream, SyncError> {
        let members_path = paths::group_members(group_id);
        // Subscribe before reading so no change between the two is missed
        let changes = self.remote.subscribe(&members_path).await?;
        let initial = read_members(self.remote.as_ref(), group_id).await?;

        let remote = self.remote.clone();
        let reread_id = group_id.clone();
        let updates = changes.then(move |_| {
            let remote = remote.clone();
            let group_id = reread_id.clone();
            async move { read_members(remote.as_ref(), &group_id).await }
        });

        let cache = self.cache.clone();
        let group_id = group_id.clone();
        let mut last: Option<BTreeSet<UserId>> = None;
        let stream = stream::once(future::ready(Ok::<_, RemoteError>(initial)))
            .chain(updates)
            .filter_map(move |result| {
                let next = match result {
                    Ok(members) if last.as_ref() != Some(&members) => {
                        if let Some(mut cached) = cache.get_mut(&group_id) {
                            cached.member_ids = members.clone();
                        }
                        last = Some(members.clone());
                        Some(members)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!(group_id = %group_id, error = %e, "member set re-read failed");
                        None
                    }
                };
                future::ready(next)
            });

        Ok(Box::pin(stream))
    }
}

async fn read_members(
    remote: &dyn RemoteStore,
    group_id: &GroupId,
) -> Result<BTreeSet<UserId>, RemoteError> {
    let node = remote.read(&paths::group_members(group_id)).await?;
    Ok(truthy_keys(node.as_ref())
        .into_iter()
        .map(UserId::new)
        .collect())
}

/// Keys of an index node (`{id: true, ...}`) whose value is not `false`.
fn truthy_keys(node: Option<&Value>) -> Vec<String> {
    match node {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Bool(false) | Value::Null))
            .map(|(k, _)| k.clone())
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_group(group_id: &GroupId, node: &Value) -> Option<GroupMembership> {
    let map = node.as_object()?;
    let text = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let created_at = map
        .get("createdAt")
        .and_then(Value::as_i64)
        .and_then(DateTime::<Utc>::from_timestamp_millis);

    Some(GroupMembership {
        group_id: group_id.clone(),
        owner_id: UserId::new(text("owner")),
        name: text("name"),
        member_ids: truthy_keys(map.get("members"))
            .into_iter()
            .map(UserId::new)
            .collect(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_node() {
        let node = json!({
            "name": "Family",
            "owner": "alice",
            "createdAt": 1717200000000i64,
            "members": {"alice": true, "bob": true, "carol": false},
        });
        let group = parse_group(&GroupId::new("g1"), &node).unwrap();

        assert_eq!(group.name, "Family");
        assert_eq!(group.owner_id, UserId::new("alice"));
        assert_eq!(group.member_ids.len(), 2);
        assert!(group.is_member(&UserId::new("bob")));
        assert_eq!(group.created_at.unwrap().timestamp_millis(), 1717200000000);
    }

    #[test]
    fn test_parse_rejects_scalar_node() {
        assert!(parse_group(&GroupId::new("g1"), &json!(true)).is_none());
    }
}
