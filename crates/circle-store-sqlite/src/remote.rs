//! Shared store backed by a SQLite file.
//!
//! Several local clients can point at the same database file to share group
//! state. Change notifications are delivered only to subscribers in the
//! process that made the write.

use async_trait::async_trait;
use circle_remote::{tree, ChangeStream, RemoteError, RemoteStore, StorePath, SubscriberRegistry};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::trace;

use crate::{connect, default_db_url};

pub struct SqliteRemoteStore {
    pool: SqlitePool,
    subscribers: SubscriberRegistry,
}

fn map_sqlx(e: sqlx::Error) -> RemoteError {
    match e {
        sqlx::Error::PoolTimedOut => RemoteError::Timeout,
        sqlx::Error::Io(io) => RemoteError::Unavailable(io.to_string()),
        other => RemoteError::Backend(other.to_string()),
    }
}

/// `substr`-based prefix match; ids may contain LIKE wildcards.
fn subtree_prefix(path: &StorePath) -> (String, i64) {
    let prefix = format!("{}/", path.as_str());
    let len = prefix.chars().count() as i64;
    (prefix, len)
}

async fn delete_subtree(conn: &mut SqliteConnection, path: &StorePath) -> Result<(), RemoteError> {
    let (prefix, len) = subtree_prefix(path);
    sqlx::query("DELETE FROM remote_entries WHERE path=? OR substr(path,1,?)=?")
        .bind(path.as_str())
        .bind(len)
        .bind(&prefix)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}

impl SqliteRemoteStore {
    /// `~/.screencircle/shared.db`
    pub async fn open_default() -> Result<Self, RemoteError> {
        let url = default_db_url("shared.db").map_err(RemoteError::Unavailable)?;
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, RemoteError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, RemoteError> {
        let pool = connect(url).await.map_err(map_sqlx)?;
        Ok(Self {
            pool,
            subscribers: SubscriberRegistry::new(),
        })
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), RemoteError> {
        if value.is_null() {
            return self.remove(path).await;
        }

        let leaves = tree::flatten(path, value.clone());
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        delete_subtree(&mut tx, path).await?;
        let mut ancestor = path.parent();
        while let Some(current) = ancestor {
            sqlx::query("DELETE FROM remote_entries WHERE path=?")
                .bind(current.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            ancestor = current.parent();
        }
        for (leaf_path, leaf) in &leaves {
            sqlx::query("INSERT INTO remote_entries(path,value) VALUES(?,?)")
                .bind(leaf_path.as_str())
                .bind(leaf.to_string())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        trace!(path = %path, leaves = leaves.len(), "remote write");

        self.subscribers.notify(path, Some(&value));
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, RemoteError> {
        let (prefix, len) = subtree_prefix(path);
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT path,value FROM remote_entries WHERE path=? OR substr(path,1,?)=? ORDER BY path",
        )
        .bind(path.as_str())
        .bind(len)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut leaves = Vec::with_capacity(rows.len());
        for (raw_path, raw_value) in rows {
            let leaf_path = StorePath::parse(&raw_path)?;
            let leaf: Value = serde_json::from_str(&raw_value)
                .map_err(|e| RemoteError::Backend(format!("corrupt value at {raw_path}: {e}")))?;
            leaves.push((leaf_path, leaf));
        }

        Ok(tree::assemble(path, leaves.iter().map(|(p, v)| (p, v))))
    }

    async fn remove(&self, path: &StorePath) -> Result<(), RemoteError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        delete_subtree(&mut conn, path).await?;
        drop(conn);
        trace!(path = %path, "remote remove");

        self.subscribers.notify(path, None);
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<ChangeStream, RemoteError> {
        Ok(self.subscribers.subscribe(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_subtree_roundtrip() {
        let s = SqliteRemoteStore::open_in_memory().await.unwrap();
        let group = StorePath::root("groups").child("g1");
        let value = json!({"name": "Owls", "owner": "alice", "members": {"alice": true}});

        s.write(&group, value.clone()).await.unwrap();

        assert_eq!(s.read(&group).await.unwrap(), Some(value));
        assert_eq!(
            s.read(&group.child("name")).await.unwrap(),
            Some(json!("Owls"))
        );
    }

    #[tokio::test]
    async fn test_wildcard_characters_in_ids_do_not_match_siblings() {
        let s = SqliteRemoteStore::open_in_memory().await.unwrap();
        let users = StorePath::root("users");
        s.write(&users.child("a_"), json!({"n": 1})).await.unwrap();
        s.write(&users.child("ab"), json!({"n": 2})).await.unwrap();

        assert_eq!(s.read(&users.child("a_")).await.unwrap(), Some(json!({"n": 1})));
        s.remove(&users.child("a_")).await.unwrap();
        assert_eq!(s.read(&users.child("ab")).await.unwrap(), Some(json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_subtree() {
        let s = SqliteRemoteStore::open_in_memory().await.unwrap();
        let members = StorePath::root("groups").child("g1").child("members");
        s.write(&members, json!({"alice": true, "bob": true})).await.unwrap();
        s.write(&members, json!({"carol": true})).await.unwrap();

        assert_eq!(s.read(&members).await.unwrap(), Some(json!({"carol": true})));
    }

    #[tokio::test]
    async fn test_write_notifies_subscribers() {
        let s = SqliteRemoteStore::open_in_memory().await.unwrap();
        let members = StorePath::root("groups").child("g1").child("members");
        let mut stream = s.subscribe(&members).await.unwrap();

        s.write(&members.child("bob"), json!(true)).await.unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.path, members.child("bob"));
        assert_eq!(event.value, Some(json!(true)));
    }
}
