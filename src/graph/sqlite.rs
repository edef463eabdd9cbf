use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{GraphEdge, GraphNode, GraphStore, NodeLabel, RelKind};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed evidence graph store.
///
/// Nodes and edges live in two generic tables; upserts use
/// `INSERT .. ON CONFLICT` so replays merge instead of duplicating, and a
/// node's `created_at` is preserved across merges.
#[derive(Clone)]
pub struct SqliteGraph {
    pool: SqlitePool,
}

impl SqliteGraph {
    /// Open (or create) a file-backed graph database.
    pub async fn new(config: &GraphConfig) -> GraphResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GraphError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| GraphError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| GraphError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let graph = Self { pool };
        graph.run_migrations().await?;

        Ok(graph)
    }

    /// Open an in-memory graph database.
    ///
    /// The pool is pinned to a single connection: SQLite's `:memory:`
    /// database is per-connection, so a second connection would see an
    /// empty schema.
    pub async fn new_in_memory() -> GraphResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            GraphError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| GraphError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let graph = Self { pool };
        graph.run_migrations().await?;

        Ok(graph)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> GraphResult<()> {
        info!("Running graph store migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| GraphError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Graph store migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const UPSERT_NODE_SQL: &str = r#"
    INSERT INTO graph_nodes (label, id, properties, created_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (label, id) DO UPDATE SET properties = excluded.properties
"#;

const UPSERT_EDGE_SQL: &str = r#"
    INSERT INTO graph_edges (rel, from_label, from_id, to_label, to_id, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (rel, from_label, from_id, to_label, to_id) DO NOTHING
"#;

#[async_trait]
impl GraphStore for SqliteGraph {
    async fn upsert_node(&self, node: &GraphNode) -> GraphResult<()> {
        let properties = serde_json::to_string(&node.properties).map_err(|e| {
            GraphError::Query {
                message: format!("Failed to serialize node properties: {}", e),
            }
        })?;

        sqlx::query(UPSERT_NODE_SQL)
            .bind(node.label.to_string())
            .bind(&node.id)
            .bind(&properties)
            .bind(node.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_nodes(&self, nodes: &[GraphNode]) -> GraphResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for node in nodes {
            let properties = serde_json::to_string(&node.properties).map_err(|e| {
                GraphError::Query {
                    message: format!("Failed to serialize node properties: {}", e),
                }
            })?;

            sqlx::query(UPSERT_NODE_SQL)
                .bind(node.label.to_string())
                .bind(&node.id)
                .bind(&properties)
                .bind(node.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn upsert_edge(&self, edge: &GraphEdge) -> GraphResult<()> {
        sqlx::query(UPSERT_EDGE_SQL)
            .bind(edge.rel.to_string())
            .bind(edge.from_label.to_string())
            .bind(&edge.from_id)
            .bind(edge.to_label.to_string())
            .bind(&edge.to_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_edges(&self, edges: &[GraphEdge]) -> GraphResult<()> {
        if edges.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for edge in edges {
            sqlx::query(UPSERT_EDGE_SQL)
                .bind(edge.rel.to_string())
                .bind(edge.from_label.to_string())
                .bind(&edge.from_id)
                .bind(edge.to_label.to_string())
                .bind(&edge.to_id)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn get_node(&self, label: NodeLabel, id: &str) -> GraphResult<Option<GraphNode>> {
        let row: Option<NodeRow> = sqlx::query_as(
            r#"
            SELECT label, id, properties, created_at
            FROM graph_nodes
            WHERE label = ? AND id = ?
            "#,
        )
        .bind(label.to_string())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(GraphNode::try_from).transpose()
    }

    async fn neighbors(
        &self,
        from_label: NodeLabel,
        from_id: &str,
        rel: RelKind,
    ) -> GraphResult<Vec<GraphNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT n.label, n.id, n.properties, n.created_at
            FROM graph_edges e
            JOIN graph_nodes n ON n.label = e.to_label AND n.id = e.to_id
            WHERE e.from_label = ? AND e.from_id = ? AND e.rel = ?
            ORDER BY n.created_at ASC, n.rowid ASC
            "#,
        )
        .bind(from_label.to_string())
        .bind(from_id)
        .bind(rel.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GraphNode::try_from).collect()
    }

    async fn count_nodes(&self, label: NodeLabel) -> GraphResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_nodes WHERE label = ?")
            .bind(label.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn count_edges(&self, rel: RelKind) -> GraphResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_edges WHERE rel = ?")
            .bind(rel.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    label: String,
    id: String,
    properties: String,
    created_at: String,
}

impl TryFrom<NodeRow> for GraphNode {
    type Error = GraphError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let label = NodeLabel::from_str(&row.label).map_err(|message| GraphError::Query {
            message,
        })?;
        let properties =
            serde_json::from_str(&row.properties).map_err(|e| GraphError::Query {
                message: format!("Failed to deserialize node properties: {}", e),
            })?;
        // Read ordering depends on this timestamp; a corrupt value is an
        // error, not something to substitute.
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GraphError::Query {
                message: format!(
                    "Invalid created_at for {} node {}: {}",
                    row.label, row.id, e
                ),
            })?;

        Ok(Self {
            label,
            id: row.id,
            properties,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_corrupt_created_at_surfaces_as_query_error() {
        let graph = SqliteGraph::new_in_memory().await.unwrap();
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO graph_nodes (label, id, properties, created_at) VALUES (?, ?, ?, ?)")
            .bind("Claim")
            .bind(&id)
            .bind("{}")
            .bind("yesterday-ish")
            .execute(graph.pool())
            .await
            .unwrap();

        let err = graph.get_node(NodeLabel::Claim, &id).await.unwrap_err();
        assert!(matches!(err, GraphError::Query { .. }));
        assert!(err.to_string().contains("created_at"));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_stored_timestamp() {
        let graph = SqliteGraph::new_in_memory().await.unwrap();
        let node = GraphNode::new(
            NodeLabel::Claim,
            Uuid::new_v4().to_string(),
            serde_json::json!({"text": "x"}),
        )
        .unwrap();

        graph.upsert_node(&node).await.unwrap();
        let loaded = graph
            .get_node(NodeLabel::Claim, &node.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.created_at, node.created_at);
    }
}
