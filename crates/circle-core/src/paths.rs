//! Remote store layout.
//!
//! ```text
//! groups/{group}/name | owner | createdAt
//! groups/{group}/members/{user} = true
//! users/{user}/profile/name | email
//! users/{user}/usage/{YYYY-MM-DD} = seconds
//! users/{user}/groups/{group} = true
//! ```

use chrono::NaiveDate;
use circle_remote::StorePath;
use circle_storage::{GroupId, UserId};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn group(group_id: &GroupId) -> StorePath {
    StorePath::root("groups").child(group_id.as_str())
}

pub fn group_members(group_id: &GroupId) -> StorePath {
    group(group_id).child("members")
}

pub fn group_member(group_id: &GroupId, user_id: &UserId) -> StorePath {
    group_members(group_id).child(user_id.as_str())
}

pub fn user(user_id: &UserId) -> StorePath {
    StorePath::root("users").child(user_id.as_str())
}

pub fn user_profile(user_id: &UserId) -> StorePath {
    user(user_id).child("profile")
}

pub fn user_usage(user_id: &UserId, date: NaiveDate) -> StorePath {
    user(user_id).child("usage").child(date_key(date))
}

pub fn user_groups(user_id: &UserId) -> StorePath {
    user(user_id).child("groups")
}

pub fn user_group(user_id: &UserId, group_id: &GroupId) -> StorePath {
    user_groups(user_id).child(group_id.as_str())
}
