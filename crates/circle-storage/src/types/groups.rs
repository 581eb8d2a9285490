//! Group and profile types shared through the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{GroupId, UserId};

/// Group record with its current member set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    pub member_ids: BTreeSet<UserId>,
    pub created_at: Option<DateTime<Utc>>,
}

impl GroupMembership {
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member_ids.contains(user_id)
    }
}

/// Public profile other group members see.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
