use chrono::{Local, NaiveDate};
use circle_core::{AggregatorConfig, GroupAggregator, GroupSnapshot};
use circle_storage::{GroupId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::format_seconds;
use crate::context::Context;

/// How often `show --watch` re-reads members, for writes made by other processes.
const WATCH_REFRESH: Duration = Duration::from_secs(30);

fn resolve_group(ctx: &Context, group_id: Option<&str>) -> Result<GroupId, Box<dyn std::error::Error>> {
    match group_id {
        Some(id) => Ok(GroupId::new(id)),
        None => Ok(GroupId::new(ctx.config.current_group()?.0)),
    }
}

pub async fn cmd_group_create(
    ctx: &mut Context,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user_id()?;
    let group_id = ctx.membership().create(name, &user_id).await?;

    ctx.config.add_group(group_id.as_str(), name);
    ctx.config.set_current_group(group_id.as_str());
    ctx.save_config()?;

    println!("Created group: {name}");
    println!("  ID: {group_id}");
    println!("Share the ID so friends can run 'circle group join {group_id}'");
    Ok(())
}

pub async fn cmd_group_join(
    ctx: &mut Context,
    group_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user_id()?;
    let group_id = GroupId::new(group_id);
    let membership = ctx.membership();

    if !membership.join(&group_id, &user_id).await? {
        return Err(format!("Group not found: {group_id}").into());
    }
    let name = membership
        .group_name(&group_id)
        .await?
        .unwrap_or_else(|| group_id.to_string());

    ctx.config.add_group(group_id.as_str(), &name);
    ctx.save_config()?;

    println!("Joined group: {name}");
    Ok(())
}

pub async fn cmd_group_leave(
    ctx: &mut Context,
    group_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user_id()?;
    let group_id = resolve_group(ctx, group_id)?;

    let left = ctx.membership().leave(&group_id, &user_id).await?;
    ctx.config.remove_group(group_id.as_str());
    ctx.save_config()?;

    if left {
        println!("Left group {group_id}");
    } else {
        println!("Not a member of {group_id}");
    }
    Ok(())
}

pub async fn cmd_group_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user_id()?;
    let membership = ctx.membership();
    let current = ctx.config.current_group.as_deref();

    let groups = match membership.groups_of(&user_id).await {
        Ok(ids) => {
            let mut groups = Vec::with_capacity(ids.len());
            for id in ids {
                let name = match ctx.config.groups.get(id.as_str()) {
                    Some(name) => name.clone(),
                    None => membership
                        .group_name(&id)
                        .await?
                        .unwrap_or_else(|| id.to_string()),
                };
                groups.push((id.to_string(), name));
            }
            groups
        }
        Err(e) => {
            warn!("Shared store unavailable, showing saved groups: {}", e);
            ctx.config
                .groups
                .iter()
                .map(|(id, name)| (id.clone(), name.clone()))
                .collect()
        }
    };

    if groups.is_empty() {
        println!("No groups found");
        return Ok(());
    }

    println!("Groups:");
    for (id, name) in groups {
        let marker = if current == Some(id.as_str()) { "*" } else { " " };
        println!("{marker} {name} ({id})");
    }
    Ok(())
}

pub async fn cmd_group_use(
    ctx: &mut Context,
    group_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !ctx.config.groups.contains_key(group_id) {
        let group = ctx
            .membership()
            .group(&GroupId::new(group_id))
            .await?
            .ok_or_else(|| format!("Group not found: {group_id}"))?;
        ctx.config.add_group(group_id, &group.name);
    }
    ctx.config.set_current_group(group_id);
    ctx.save_config()?;

    println!("Current group: {group_id}");
    Ok(())
}

pub async fn cmd_group_show(
    ctx: &Context,
    group_id: Option<&str>,
    date: Option<NaiveDate>,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let group_id = resolve_group(ctx, group_id)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let me = ctx.config.user.as_ref().map(|u| UserId::new(u.user_id.clone()));
    let name = match ctx.config.groups.get(group_id.as_str()) {
        Some(name) => name.clone(),
        None => group_id.to_string(),
    };

    let read_timeout = ctx.config.sync.member_read_timeout();
    let aggregator = GroupAggregator::new(
        ctx.remote.clone(),
        Arc::new(ctx.membership()),
        AggregatorConfig {
            member_read_timeout: read_timeout,
        },
    );
    let mut subscription = aggregator.subscribe(group_id, date).await?;

    if !watch {
        let snapshot = tokio::time::timeout(read_timeout * 2, subscription.next_snapshot())
            .await
            .map_err(|_| "Timed out waiting for group data")?
            .ok_or("Group subscription ended")?;
        print_snapshot(&name, &snapshot, me.as_ref());
        return Ok(());
    }

    let mut refresh = tokio::time::interval(WATCH_REFRESH);
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    refresh.tick().await;

    loop {
        tokio::select! {
            snapshot = subscription.next_snapshot() => match snapshot {
                Some(snapshot) => print_snapshot(&name, &snapshot, me.as_ref()),
                None => break,
            },
            _ = refresh.tick() => subscription.refresh(),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn print_snapshot(name: &str, snapshot: &GroupSnapshot, me: Option<&UserId>) {
    println!("{name} on {}", snapshot.date);
    if snapshot.members.is_empty() {
        println!("  No members");
        return;
    }
    for (rank, member) in snapshot.members.iter().enumerate() {
        let mut notes = Vec::new();
        if Some(&member.user_id) == me {
            notes.push("you");
        }
        if !member.reachable {
            notes.push("unreachable");
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };
        println!(
            "  {:>2}. {:<20} {:>10}{notes}",
            rank + 1,
            member.display_name,
            format_seconds(member.today_usage_seconds)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_config::ClientConfig;
    use circle_remote_memory::MemoryRemoteStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_join_leave_keep_config_in_step() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut alice = Context::for_tests(dir.path(), "alice", remote.clone()).await;
        let mut bob = Context::for_tests(dir.path(), "bob", remote.clone()).await;

        cmd_group_create(&mut alice, "Friends").await.unwrap();
        let (group_id, name) = alice.config.current_group().unwrap();
        assert_eq!(name, Some("Friends"));
        let group_id = group_id.to_string();

        cmd_group_join(&mut bob, &group_id).await.unwrap();
        assert_eq!(bob.config.current_group().unwrap().0, group_id);
        let saved = ClientConfig::load_from(&bob.config_path).unwrap();
        assert_eq!(saved.groups.get(&group_id).map(String::as_str), Some("Friends"));

        let members = alice
            .membership()
            .members_of(&GroupId::new(group_id.clone()))
            .await
            .unwrap();
        assert_eq!(members.len(), 2);

        cmd_group_leave(&mut bob, None).await.unwrap();
        assert!(bob.config.current_group.is_none());
        assert!(bob.config.groups.is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_group_fails() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut bob = Context::for_tests(dir.path(), "bob", remote).await;

        let err = cmd_group_join(&mut bob, "missing").await.unwrap_err();
        assert!(err.to_string().contains("Group not found"));
        assert!(bob.config.groups.is_empty());
    }

    #[tokio::test]
    async fn test_use_unknown_group_fails() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut bob = Context::for_tests(dir.path(), "bob", remote).await;

        assert!(cmd_group_use(&mut bob, "missing").await.is_err());
        assert!(bob.config.current_group.is_none());
    }
}
