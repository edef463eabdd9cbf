//! Evidence graph: typed property-graph vocabulary and the storage trait.
//!
//! The graph links tasks to the decisions made for them and decisions to
//! their provenance: `Task -[DECIDED_BY]-> Decision -[ASSERTS]-> Claim
//! -[SUPPORTED_BY]-> Evidence`, plus `Decision -[VERIFIED_BY]->
//! Verification`. All writes are merge-or-create upserts keyed on
//! `(label, id)`, so replaying a persistence call is a no-op.

mod evidence;
mod sqlite;

pub use evidence::EvidenceGraph;
pub use sqlite::SqliteGraph;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphError, GraphResult};

/// Node labels in the evidence graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    /// A unit of work routed by the kernel.
    Task,
    /// A governed routing decision.
    Decision,
    /// An assertion made in service of a decision.
    Claim,
    /// Support for a claim.
    Evidence,
    /// The result of checking a decision's output.
    Verification,
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeLabel::Task => write!(f, "Task"),
            NodeLabel::Decision => write!(f, "Decision"),
            NodeLabel::Claim => write!(f, "Claim"),
            NodeLabel::Evidence => write!(f, "Evidence"),
            NodeLabel::Verification => write!(f, "Verification"),
        }
    }
}

impl std::str::FromStr for NodeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Task" => Ok(NodeLabel::Task),
            "Decision" => Ok(NodeLabel::Decision),
            "Claim" => Ok(NodeLabel::Claim),
            "Evidence" => Ok(NodeLabel::Evidence),
            "Verification" => Ok(NodeLabel::Verification),
            _ => Err(format!("Unknown node label: {}", s)),
        }
    }
}

/// Relationship kinds between evidence-graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    /// Task to the decision that routed it.
    DecidedBy,
    /// Decision to a claim it asserts.
    Asserts,
    /// Claim to an evidence item backing it.
    SupportedBy,
    /// Decision to a verification of its output.
    VerifiedBy,
}

impl std::fmt::Display for RelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelKind::DecidedBy => write!(f, "DECIDED_BY"),
            RelKind::Asserts => write!(f, "ASSERTS"),
            RelKind::SupportedBy => write!(f, "SUPPORTED_BY"),
            RelKind::VerifiedBy => write!(f, "VERIFIED_BY"),
        }
    }
}

impl std::str::FromStr for RelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DECIDED_BY" => Ok(RelKind::DecidedBy),
            "ASSERTS" => Ok(RelKind::Asserts),
            "SUPPORTED_BY" => Ok(RelKind::SupportedBy),
            "VERIFIED_BY" => Ok(RelKind::VerifiedBy),
            _ => Err(format!("Unknown relationship kind: {}", s)),
        }
    }
}

/// One node in the evidence graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node label.
    pub label: NodeLabel,
    /// Node identifier, a UUID string.
    pub id: String,
    /// Property map; always a JSON object.
    pub properties: serde_json::Value,
    /// When the node was first created.
    pub created_at: DateTime<Utc>,
}

impl GraphNode {
    /// Build a node, checking the id and property-map shape.
    pub fn new(
        label: NodeLabel,
        id: impl Into<String>,
        properties: serde_json::Value,
    ) -> GraphResult<Self> {
        let id = id.into();
        validate_id(&id)?;
        if !properties.is_object() {
            return Err(GraphError::InvalidProperties {
                label: label.to_string(),
                id,
            });
        }
        Ok(Self {
            label,
            id,
            properties,
            created_at: Utc::now(),
        })
    }
}

/// One directed edge in the evidence graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Relationship kind.
    pub rel: RelKind,
    /// Label of the source node.
    pub from_label: NodeLabel,
    /// Identifier of the source node.
    pub from_id: String,
    /// Label of the target node.
    pub to_label: NodeLabel,
    /// Identifier of the target node.
    pub to_id: String,
}

impl GraphEdge {
    /// Build an edge, checking both endpoint ids.
    pub fn new(
        rel: RelKind,
        from_label: NodeLabel,
        from_id: impl Into<String>,
        to_label: NodeLabel,
        to_id: impl Into<String>,
    ) -> GraphResult<Self> {
        let from_id = from_id.into();
        let to_id = to_id.into();
        validate_id(&from_id)?;
        validate_id(&to_id)?;
        Ok(Self {
            rel,
            from_label,
            from_id,
            to_label,
            to_id,
        })
    }
}

/// Reject any node identifier that is not a UUID.
///
/// Runs before every store call so malformed ids never reach the backend.
pub fn validate_id(id: &str) -> GraphResult<()> {
    Uuid::parse_str(id).map_err(|_| GraphError::InvalidId {
        value: id.to_string(),
    })?;
    Ok(())
}

/// Storage backend for the evidence graph.
///
/// Implementations must make every upsert idempotent: re-writing an
/// existing node updates its properties in place, and re-writing an
/// existing edge is a no-op.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merge-or-create a single node.
    async fn upsert_node(&self, node: &GraphNode) -> GraphResult<()>;

    /// Merge-or-create a batch of nodes in one transaction.
    async fn upsert_nodes(&self, nodes: &[GraphNode]) -> GraphResult<()>;

    /// Merge-or-create a single edge.
    async fn upsert_edge(&self, edge: &GraphEdge) -> GraphResult<()>;

    /// Merge-or-create a batch of edges in one transaction.
    async fn upsert_edges(&self, edges: &[GraphEdge]) -> GraphResult<()>;

    /// Fetch one node by label and id.
    async fn get_node(&self, label: NodeLabel, id: &str) -> GraphResult<Option<GraphNode>>;

    /// Fetch the nodes reachable from `(from_label, from_id)` over `rel`,
    /// ordered by target creation time then insertion order.
    async fn neighbors(
        &self,
        from_label: NodeLabel,
        from_id: &str,
        rel: RelKind,
    ) -> GraphResult<Vec<GraphNode>>;

    /// Count nodes with the given label.
    async fn count_nodes(&self, label: NodeLabel) -> GraphResult<i64>;

    /// Count edges with the given kind.
    async fn count_edges(&self, rel: RelKind) -> GraphResult<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_label_and_rel_round_trip() {
        for label in [
            NodeLabel::Task,
            NodeLabel::Decision,
            NodeLabel::Claim,
            NodeLabel::Evidence,
            NodeLabel::Verification,
        ] {
            assert_eq!(NodeLabel::from_str(&label.to_string()).unwrap(), label);
        }
        for rel in [
            RelKind::DecidedBy,
            RelKind::Asserts,
            RelKind::SupportedBy,
            RelKind::VerifiedBy,
        ] {
            assert_eq!(RelKind::from_str(&rel.to_string()).unwrap(), rel);
        }
        assert_eq!(RelKind::DecidedBy.to_string(), "DECIDED_BY");
        assert!(NodeLabel::from_str("task").is_err());
    }

    #[test]
    fn test_validate_id_accepts_uuids_only() {
        assert!(validate_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(matches!(
            validate_id("decision-42"),
            Err(GraphError::InvalidId { .. })
        ));
        assert!(validate_id("").is_err());
    }

    #[test]
    fn test_node_requires_object_properties() {
        let id = Uuid::new_v4().to_string();
        assert!(GraphNode::new(NodeLabel::Claim, &id, serde_json::json!({"text": "x"})).is_ok());

        let err = GraphNode::new(NodeLabel::Claim, &id, serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, GraphError::InvalidProperties { .. }));
    }

    #[test]
    fn test_edge_checks_both_endpoints() {
        let good = Uuid::new_v4().to_string();
        let err = GraphEdge::new(RelKind::Asserts, NodeLabel::Decision, &good, NodeLabel::Claim, "nope")
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidId { .. }));
    }
}
