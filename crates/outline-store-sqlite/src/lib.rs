#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-store-sqlite** – SQLite-based persistent storage driver for the
//! outline engine.
//!
//! Persists nodes, their URLs, and the per-container event log (`nodes`,
//! `event_data`, `urls`) with sqlx, giving ACID commits and the snapshot
//! isolation a Serializer's read/write phase needs via a single
//! `sqlx::Transaction` per `commit` call.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_store_core::{NodeChangeSet, NodeStore, StoreError};
use outline_types::{
    ContainerId, Event, EventId, EventPayload, Node, NodeId, Sequence, UrlRecord, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// A persistent storage backend using SQLite.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a SQLite database at `path`, running migrations.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path.as_ref()).create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Open an ephemeral in-memory SQLite database. Useful for tests.
    ///
    /// `:memory:` databases are private to the connection that opened
    /// them, so the pool is pinned to a single connection — otherwise a
    /// query acquiring a second connection would see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
        Self::from_pool(pool).await
    }

    /// Build a store from an existing pool, running migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                uuid TEXT PRIMARY KEY,
                container_id TEXT NOT NULL,
                parent_id TEXT,
                prev_id TEXT,
                content TEXT NOT NULL,
                creator_id TEXT NOT NULL,
                inserted_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating nodes table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node_id TEXT NOT NULL,
                url TEXT NOT NULL,
                start_bytes INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                metadata TEXT,
                inserted_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating urls table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_data (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                user_id TEXT NOT NULL,
                container_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                inserted_at TEXT NOT NULL,
                UNIQUE(container_id, sequence)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating event_data table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_container ON nodes(container_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_nodes_container_parent ON nodes(container_id, parent_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_urls_node ON urls(node_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_container_seq ON event_data(container_id, sequence)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn load_urls(&self, node_id: NodeId) -> Result<Vec<UrlRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT url, start_bytes, size_bytes, metadata FROM urls WHERE node_id = ? ORDER BY start_bytes ASC, id ASC",
        )
        .bind(node_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

        rows.into_iter()
            .map(|row| row_to_url_record(node_id, row))
            .collect()
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> Result<Node, StoreError> {
        let node = row_to_node(&row)?;
        let urls = self.load_urls(node.uuid).await?;
        Ok(Node { urls, ..node })
    }
}

fn parse_uuid_col(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Backend(anyhow::anyhow!("bad uuid column {raw:?}: {e}")))
}

fn row_to_node(row: &sqlx::sqlite::SqliteRow) -> Result<Node, StoreError> {
    let uuid: String = row.try_get("uuid").map_err(|e| StoreError::Backend(e.into()))?;
    let container_id: String = row.try_get("container_id").map_err(|e| StoreError::Backend(e.into()))?;
    let parent_id: Option<String> = row.try_get("parent_id").map_err(|e| StoreError::Backend(e.into()))?;
    let prev_id: Option<String> = row.try_get("prev_id").map_err(|e| StoreError::Backend(e.into()))?;
    let content: String = row.try_get("content").map_err(|e| StoreError::Backend(e.into()))?;
    let creator_id: String = row.try_get("creator_id").map_err(|e| StoreError::Backend(e.into()))?;
    let inserted_at: String = row.try_get("inserted_at").map_err(|e| StoreError::Backend(e.into()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| StoreError::Backend(e.into()))?;

    Ok(Node {
        uuid: NodeId(parse_uuid_col(&uuid)?),
        container_id: ContainerId(parse_uuid_col(&container_id)?),
        parent_id: parent_id.map(|p| parse_uuid_col(&p)).transpose()?.map(NodeId),
        prev_id: prev_id.map(|p| parse_uuid_col(&p)).transpose()?.map(NodeId),
        content,
        creator_id: UserId(creator_id),
        urls: Vec::new(),
        inserted_at: parse_rfc3339(&inserted_at)?,
        updated_at: parse_rfc3339(&updated_at)?,
    })
}

fn row_to_url_record(node_id: NodeId, row: sqlx::sqlite::SqliteRow) -> Result<UrlRecord, StoreError> {
    let url: String = row.try_get("url").map_err(|e| StoreError::Backend(e.into()))?;
    let start_bytes: i64 = row.try_get("start_bytes").map_err(|e| StoreError::Backend(e.into()))?;
    let size_bytes: i64 = row.try_get("size_bytes").map_err(|e| StoreError::Backend(e.into()))?;
    let metadata: Option<String> = row.try_get("metadata").map_err(|e| StoreError::Backend(e.into()))?;
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| StoreError::Backend(e.into()))?;
    Ok(UrlRecord { start_bytes: start_bytes as usize, size_bytes: size_bytes as usize, url, node_id, metadata })
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("bad timestamp {raw:?}: {e}")))
}

async fn write_node(tx: &mut Transaction<'_, Sqlite>, node: &Node) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO nodes (uuid, container_id, parent_id, prev_id, content, creator_id, inserted_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(uuid) DO UPDATE SET
            container_id = excluded.container_id,
            parent_id = excluded.parent_id,
            prev_id = excluded.prev_id,
            content = excluded.content,
            creator_id = excluded.creator_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(node.uuid.to_string())
    .bind(node.container_id.to_string())
    .bind(node.parent_id.map(|p| p.to_string()))
    .bind(node.prev_id.map(|p| p.to_string()))
    .bind(&node.content)
    .bind(node.creator_id.to_string())
    .bind(node.inserted_at.to_rfc3339())
    .bind(node.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::Backend(e.into()))?;

    sqlx::query("DELETE FROM urls WHERE node_id = ?")
        .bind(node.uuid.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

    for url in &node.urls {
        let metadata = url
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Backend(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO urls (node_id, url, start_bytes, size_bytes, metadata, inserted_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(node.uuid.to_string())
        .bind(&url.url)
        .bind(url.start_bytes as i64)
        .bind(url.size_bytes as i64)
        .bind(metadata)
        .bind(node.updated_at.to_rfc3339())
        .bind(node.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;
    }

    Ok(())
}

#[async_trait]
impl NodeStore for SqliteStore {
    async fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query("SELECT * FROM nodes WHERE uuid = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_container(&self, container_id: ContainerId) -> Result<Vec<Node>, StoreError> {
        let all = self.load_container_nodes(container_id).await?;
        Ok(pre_order(&all, container_id, None))
    }

    async fn count_by_container(&self, container_id: ContainerId) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM nodes WHERE container_id = ?")
            .bind(container_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let count: i64 = row.try_get("count").map_err(|e| StoreError::Backend(e.into()))?;
        Ok(count as usize)
    }

    async fn all_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let root = self.get(id).await?.ok_or(StoreError::NodeNotFound(id))?;
        let all = self.load_container_nodes(root.container_id).await?;
        Ok(pre_order(&all, root.container_id, Some(id)))
    }

    async fn direct_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let root = self.get(id).await?.ok_or(StoreError::NodeNotFound(id))?;
        let all = self.load_container_nodes(root.container_id).await?;
        Ok(sibling_chain(&all, root.container_id, Some(id)))
    }

    async fn direct_siblings(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let node = self.get(id).await?.ok_or(StoreError::NodeNotFound(id))?;
        let all = self.load_container_nodes(node.container_id).await?;
        Ok(sibling_chain(&all, node.container_id, node.parent_id)
            .into_iter()
            .filter(|n| n.uuid != id)
            .collect())
    }

    async fn node_above(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let node = self.get(id).await?.ok_or(StoreError::NodeNotFound(id))?;
        let all = self.load_container_nodes(node.container_id).await?;
        Ok(node_above(&all, &node))
    }

    async fn node_below(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let node = self.get(id).await?.ok_or(StoreError::NodeNotFound(id))?;
        let all = self.load_container_nodes(node.container_id).await?;
        Ok(node_below(&all, &node))
    }

    async fn sibling_head(
        &self,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
    ) -> Result<Option<Node>, StoreError> {
        let all = self.load_container_nodes(container_id).await?;
        Ok(sibling_chain(&all, container_id, parent_id).into_iter().next())
    }

    async fn next_sibling(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query("SELECT * FROM nodes WHERE prev_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn latest_sequence(&self, container_id: ContainerId) -> Result<Sequence, StoreError> {
        let row = sqlx::query("SELECT MAX(sequence) as max_seq FROM event_data WHERE container_id = ?")
            .bind(container_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let max_seq: Option<i64> = row.try_get("max_seq").map_err(|e| StoreError::Backend(e.into()))?;
        Ok(max_seq.map(|s| Sequence(s as u64)).unwrap_or(Sequence::ZERO))
    }

    async fn list_events(&self, container_id: ContainerId) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            "SELECT event_id, payload, user_id, sequence, inserted_at FROM event_data WHERE container_id = ? ORDER BY sequence ASC",
        )
        .bind(container_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn commit(
        &self,
        container_id: ContainerId,
        changes: NodeChangeSet,
        event_id: EventId,
        user_id: UserId,
        payload: EventPayload,
        created_at: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.into()))?;

        // Idempotent retry: a caller may resubmit with the same event_id
        // after a TransientError; return the prior outcome rather
        // than re-applying the mutation.
        if let Some(existing) = sqlx::query(
            "SELECT event_id, payload, user_id, sequence, inserted_at FROM event_data WHERE event_id = ?",
        )
        .bind(event_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.into()))?
        {
            return row_to_event(existing);
        }

        let row = sqlx::query("SELECT MAX(sequence) as max_seq FROM event_data WHERE container_id = ?")
            .bind(container_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let max_seq: Option<i64> = row.try_get("max_seq").map_err(|e| StoreError::Backend(e.into()))?;
        let sequence = Sequence(max_seq.map(|s| s as u64).unwrap_or(0) + 1);

        for id in &changes.deletes {
            sqlx::query("DELETE FROM urls WHERE node_id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;
            sqlx::query("DELETE FROM nodes WHERE uuid = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;
        }

        for node in &changes.upserts {
            write_node(&mut tx, node).await?;
        }

        let payload_json = serde_json::to_string(&payload).map_err(|e| StoreError::Backend(e.into()))?;
        let insert = sqlx::query(
            r#"
            INSERT INTO event_data (event_id, event_type, payload, user_id, container_id, sequence, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event_id.to_string())
        .bind(payload.type_name())
        .bind(&payload_json)
        .bind(user_id.to_string())
        .bind(container_id.to_string())
        .bind(sequence.0 as i64)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(StoreError::Conflict);
            }
            Err(e) => return Err(StoreError::Backend(e.into())),
        }

        tx.commit().await.map_err(|e| StoreError::Backend(e.into()))?;

        Ok(Event { event_id, payload, user_id, created_at, sequence })
    }
}

impl SqliteStore {
    async fn load_container_nodes(&self, container_id: ContainerId) -> Result<Vec<Node>, StoreError> {
        let rows = sqlx::query("SELECT * FROM nodes WHERE container_id = ?")
            .bind(container_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            nodes.push(self.hydrate(row).await?);
        }
        Ok(nodes)
    }
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<Event, StoreError> {
    let event_id: String = row.try_get("event_id").map_err(|e| StoreError::Backend(e.into()))?;
    let payload: String = row.try_get("payload").map_err(|e| StoreError::Backend(e.into()))?;
    let user_id: String = row.try_get("user_id").map_err(|e| StoreError::Backend(e.into()))?;
    let sequence: i64 = row.try_get("sequence").map_err(|e| StoreError::Backend(e.into()))?;
    let inserted_at: String = row.try_get("inserted_at").map_err(|e| StoreError::Backend(e.into()))?;

    Ok(Event {
        event_id: event_id.parse().map_err(|e| StoreError::Backend(anyhow::anyhow!("{e}")))?,
        payload: serde_json::from_str(&payload).map_err(|e| StoreError::Backend(e.into()))?,
        user_id: UserId(user_id),
        created_at: parse_rfc3339(&inserted_at)?,
        sequence: Sequence(sequence as u64),
    })
}

fn sibling_chain(all: &[Node], container_id: ContainerId, parent_id: Option<NodeId>) -> Vec<Node> {
    let group: Vec<&Node> = all.iter().filter(|n| n.container_id == container_id && n.parent_id == parent_id).collect();
    let mut by_prev: HashMap<Option<NodeId>, &Node> = HashMap::new();
    for n in &group {
        by_prev.insert(n.prev_id, n);
    }
    let mut chain = Vec::with_capacity(group.len());
    let mut cursor = None;
    while let Some(n) = by_prev.get(&cursor) {
        chain.push((*n).clone());
        cursor = Some(n.uuid);
    }
    chain
}

fn pre_order(all: &[Node], container_id: ContainerId, parent_id: Option<NodeId>) -> Vec<Node> {
    let mut out = Vec::new();
    for n in sibling_chain(all, container_id, parent_id) {
        let id = n.uuid;
        out.push(n);
        out.extend(pre_order(all, container_id, Some(id)));
    }
    out
}

fn node_above(all: &[Node], node: &Node) -> Option<Node> {
    match node.prev_id {
        Some(prev_id) => {
            let mut cursor = all.iter().find(|n| n.uuid == prev_id)?.clone();
            loop {
                let children = sibling_chain(all, cursor.container_id, Some(cursor.uuid));
                match children.into_iter().last() {
                    Some(last) => cursor = last,
                    None => break,
                }
            }
            Some(cursor)
        }
        None => node.parent_id.and_then(|p| all.iter().find(|n| n.uuid == p).cloned()),
    }
}

fn node_below(all: &[Node], node: &Node) -> Option<Node> {
    let children = sibling_chain(all, node.container_id, Some(node.uuid));
    if let Some(first) = children.into_iter().next() {
        return Some(first);
    }
    let mut cursor = node.clone();
    loop {
        let siblings = sibling_chain(all, cursor.container_id, cursor.parent_id);
        if let Some(next) = siblings.into_iter().find(|n| n.prev_id == Some(cursor.uuid)) {
            return Some(next);
        }
        cursor = all.iter().find(|n| Some(n.uuid) == cursor.parent_id)?.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_types::EventPayload;

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn node(container: ContainerId, parent: Option<NodeId>, prev: Option<NodeId>, content: &str) -> Node {
        Node::new(NodeId::new(), container, parent, prev, content.into(), "u1".into(), Utc::now())
    }

    #[tokio::test]
    async fn commit_persists_node_and_event() {
        let store = store().await;
        let container = ContainerId::new();
        let a = node(container, None, None, "hello");

        let event = store
            .commit(
                container,
                NodeChangeSet::new().upsert(a.clone()),
                EventId::new(Uuid::new_v4(), "s1").unwrap(),
                "u1".into(),
                EventPayload::NodeInserted { node: a.clone(), next: None, content: "hello".into(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(event.sequence, Sequence(1));

        let fetched = store.get(a.uuid).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
    }

    #[tokio::test]
    async fn duplicate_event_id_is_idempotent() {
        let store = store().await;
        let container = ContainerId::new();
        let a = node(container, None, None, "x");
        let event_id = EventId::new(Uuid::new_v4(), "s1").unwrap();

        let first = store
            .commit(
                container,
                NodeChangeSet::new().upsert(a.clone()),
                event_id.clone(),
                "u1".into(),
                EventPayload::NodeInserted { node: a.clone(), next: None, content: "x".into(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();

        let second = store
            .commit(
                container,
                NodeChangeSet::new().upsert(a.clone()),
                event_id,
                "u1".into(),
                EventPayload::NodeInserted { node: a.clone(), next: None, content: "x".into(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(first.sequence, second.sequence);
        assert_eq!(store.count_by_container(container).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_by_container_orders_preorder() {
        let store = store().await;
        let container = ContainerId::new();
        let a = node(container, None, None, "a");
        let b = node(container, None, Some(a.uuid), "b");
        let x = node(container, Some(a.uuid), None, "x");

        for n in [&a, &b, &x] {
            store
                .commit(
                    container,
                    NodeChangeSet::new().upsert((*n).clone()),
                    EventId::new(Uuid::new_v4(), "s1").unwrap(),
                    "u1".into(),
                    EventPayload::NodeContentChanged { node_id: n.uuid, content: n.content.clone(), container_id: container },
                    Utc::now(),
                )
                .await
                .unwrap();
        }

        let traversal = store.list_by_container(container).await.unwrap();
        let contents: Vec<&str> = traversal.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "x", "b"]);
    }
}
