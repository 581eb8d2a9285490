//! Membership index against the in-memory remote store.

use circle_core::{MemberStream, MembershipIndex};
use circle_remote::RemoteStore;
use circle_remote_memory::MemoryRemoteStore;
use circle_storage::{GroupId, UserId};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn user(id: &str) -> UserId {
    UserId::new(id)
}

fn set(ids: &[&str]) -> BTreeSet<UserId> {
    ids.iter().map(|id| user(id)).collect()
}

fn index() -> (Arc<MemoryRemoteStore>, MembershipIndex) {
    let remote = Arc::new(MemoryRemoteStore::new());
    let index = MembershipIndex::new(remote.clone());
    (remote, index)
}

#[tokio::test]
async fn create_records_owner_and_metadata() {
    let (_, index) = index();
    let group_id = index.create("Family", &user("alice")).await.unwrap();

    let group = index.group(&group_id).await.unwrap().unwrap();
    assert_eq!(group.name, "Family");
    assert_eq!(group.owner_id, user("alice"));
    assert_eq!(group.member_ids, set(&["alice"]));
    assert!(group.created_at.is_some());

    assert_eq!(
        index.group_name(&group_id).await.unwrap().as_deref(),
        Some("Family")
    );
    assert_eq!(index.groups_of(&user("alice")).await.unwrap(), vec![group_id]);
}

#[tokio::test]
async fn join_is_idempotent() {
    let (remote, index) = index();
    let group_id = index.create("Family", &user("alice")).await.unwrap();

    assert!(index.join(&group_id, &user("bob")).await.unwrap());
    let leaves = remote.len();
    assert!(index.join(&group_id, &user("bob")).await.unwrap());

    assert_eq!(remote.len(), leaves);
    assert_eq!(
        index.members_of(&group_id).await.unwrap(),
        set(&["alice", "bob"])
    );
    assert_eq!(index.groups_of(&user("bob")).await.unwrap(), vec![group_id]);
}

#[tokio::test]
async fn join_unknown_group_returns_false() {
    let (remote, index) = index();
    let missing = GroupId::new("nope");

    assert!(!index.join(&missing, &user("bob")).await.unwrap());
    assert!(remote.is_empty());
    assert!(index.group(&missing).await.unwrap().is_none());
    assert!(index.members_of(&missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn leave_removes_member_and_user_index() {
    let (_, index) = index();
    let group_id = index.create("Family", &user("alice")).await.unwrap();
    index.join(&group_id, &user("bob")).await.unwrap();

    assert!(index.leave(&group_id, &user("bob")).await.unwrap());
    assert!(!index.leave(&group_id, &user("bob")).await.unwrap());
    assert!(!index.leave(&group_id, &user("carol")).await.unwrap());

    assert_eq!(index.members_of(&group_id).await.unwrap(), set(&["alice"]));
    assert!(index.groups_of(&user("bob")).await.unwrap().is_empty());
    // The group itself survives
    assert!(index.group(&group_id).await.unwrap().is_some());
    assert_eq!(index.cached(&group_id).unwrap().member_ids, set(&["alice"]));
}

#[tokio::test]
async fn owner_leaving_keeps_empty_group() {
    let (_, index) = index();
    let group_id = index.create("Solo", &user("alice")).await.unwrap();

    assert!(index.leave(&group_id, &user("alice")).await.unwrap());
    let group = index.group(&group_id).await.unwrap().unwrap();
    assert!(group.member_ids.is_empty());
    assert_eq!(group.name, "Solo");
}

async fn next(stream: &mut MemberStream) -> Option<BTreeSet<UserId>> {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("member stream stalled")
}

#[tokio::test]
async fn watch_members_streams_current_then_changes() {
    let (remote, index) = index();
    let group_id = index.create("Family", &user("alice")).await.unwrap();

    let mut members = index.watch_members(&group_id).await.unwrap();

    assert_eq!(next(&mut members).await, Some(set(&["alice"])));

    index.join(&group_id, &user("bob")).await.unwrap();
    assert_eq!(
        next(&mut members).await,
        Some(set(&["alice", "bob"]))
    );

    // Rename touches the group node but not the member set
    remote
        .write(
            &circle_core::paths::group(&group_id).child("name"),
            serde_json::json!("Renamed"),
        )
        .await
        .unwrap();
    index.leave(&group_id, &user("alice")).await.unwrap();
    assert_eq!(next(&mut members).await, Some(set(&["bob"])));
}
