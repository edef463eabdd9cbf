use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::{validate_id, GraphEdge, GraphNode, GraphStore, NodeLabel, RelKind};
use crate::error::{GraphError, GraphResult};
use crate::record::{Claim, DecisionRecord, Evidence, RouteDecision, Verification};

/// Maps [`DecisionRecord`]s onto the evidence graph and back.
///
/// Persistence writes the full provenance chain for one record:
/// the task and decision nodes with their `DECIDED_BY` edge, then claims,
/// evidence, and verifications in batched upserts. Every id is validated
/// before the first store call, so a malformed record never half-writes.
pub struct EvidenceGraph {
    store: Arc<dyn GraphStore>,
}

impl EvidenceGraph {
    /// Wrap a storage backend.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Persist one decision record, merging with any prior write.
    ///
    /// Idempotent: replaying the same record leaves node and edge counts
    /// unchanged. Store errors propagate unmodified.
    pub async fn persist(&self, record: &DecisionRecord) -> GraphResult<()> {
        self.validate_record_ids(record)?;

        let decision = &record.decision;
        let task_node = GraphNode::new(
            NodeLabel::Task,
            &decision.task_id,
            serde_json::json!({ "id": decision.task_id }),
        )?;
        let decision_node = node_from(NodeLabel::Decision, &decision.id, decision)?;

        self.store.upsert_node(&task_node).await?;
        self.store.upsert_node(&decision_node).await?;
        self.store
            .upsert_edge(&GraphEdge::new(
                RelKind::DecidedBy,
                NodeLabel::Task,
                &decision.task_id,
                NodeLabel::Decision,
                &decision.id,
            )?)
            .await?;

        let mut claim_nodes = Vec::with_capacity(record.claims.len());
        let mut claim_edges = Vec::with_capacity(record.claims.len());
        for claim in &record.claims {
            claim_nodes.push(node_from(NodeLabel::Claim, &claim.id, claim)?);
            claim_edges.push(GraphEdge::new(
                RelKind::Asserts,
                NodeLabel::Decision,
                &decision.id,
                NodeLabel::Claim,
                &claim.id,
            )?);
        }
        self.store.upsert_nodes(&claim_nodes).await?;
        self.store.upsert_edges(&claim_edges).await?;

        let mut evidence_nodes = Vec::with_capacity(record.evidence.len());
        let mut evidence_edges = Vec::with_capacity(record.evidence.len());
        for item in &record.evidence {
            evidence_nodes.push(node_from(NodeLabel::Evidence, &item.id, item)?);
            evidence_edges.push(GraphEdge::new(
                RelKind::SupportedBy,
                NodeLabel::Claim,
                &item.claim_id,
                NodeLabel::Evidence,
                &item.id,
            )?);
        }
        self.store.upsert_nodes(&evidence_nodes).await?;
        self.store.upsert_edges(&evidence_edges).await?;

        let mut verification_nodes = Vec::with_capacity(record.verifications.len());
        let mut verification_edges = Vec::with_capacity(record.verifications.len());
        for verification in &record.verifications {
            verification_nodes.push(node_from(
                NodeLabel::Verification,
                &verification.id,
                verification,
            )?);
            verification_edges.push(GraphEdge::new(
                RelKind::VerifiedBy,
                NodeLabel::Decision,
                &decision.id,
                NodeLabel::Verification,
                &verification.id,
            )?);
        }
        self.store.upsert_nodes(&verification_nodes).await?;
        self.store.upsert_edges(&verification_edges).await?;

        info!(
            decision_id = %decision.id,
            task_id = %decision.task_id,
            claims = record.claims.len(),
            evidence = record.evidence.len(),
            verifications = record.verifications.len(),
            "Persisted decision record to evidence graph"
        );
        Ok(())
    }

    /// Load one decision record by decision id.
    ///
    /// Returns `None` when no such decision node exists. Collections come
    /// back in creation order and are empty for hops the record never made.
    pub async fn load_by_decision(&self, decision_id: &str) -> GraphResult<Option<DecisionRecord>> {
        validate_id(decision_id)?;

        let Some(node) = self.store.get_node(NodeLabel::Decision, decision_id).await? else {
            return Ok(None);
        };
        let decision: RouteDecision = from_node(&node)?;

        let claim_nodes = self
            .store
            .neighbors(NodeLabel::Decision, decision_id, RelKind::Asserts)
            .await?;
        let claims: Vec<Claim> = dedup_by_id(claim_nodes)
            .iter()
            .map(from_node)
            .collect::<GraphResult<_>>()?;

        // Evidence comes back grouped by claim; re-sort by node creation
        // time so the merged collection keeps global append order.
        let mut evidence_nodes: Vec<GraphNode> = Vec::new();
        let mut seen_evidence = HashSet::new();
        for claim in &claims {
            let nodes = self
                .store
                .neighbors(NodeLabel::Claim, &claim.id, RelKind::SupportedBy)
                .await?;
            for node in nodes {
                if seen_evidence.insert(node.id.clone()) {
                    evidence_nodes.push(node);
                }
            }
        }
        evidence_nodes.sort_by_key(|node| node.created_at);
        let evidence: Vec<Evidence> = evidence_nodes
            .iter()
            .map(from_node)
            .collect::<GraphResult<_>>()?;

        let verification_nodes = self
            .store
            .neighbors(NodeLabel::Decision, decision_id, RelKind::VerifiedBy)
            .await?;
        let verifications: Vec<Verification> = dedup_by_id(verification_nodes)
            .iter()
            .map(from_node)
            .collect::<GraphResult<_>>()?;

        debug!(
            decision_id,
            claims = claims.len(),
            evidence = evidence.len(),
            verifications = verifications.len(),
            "Loaded decision record from evidence graph"
        );
        Ok(Some(DecisionRecord {
            decision,
            claims,
            evidence,
            verifications,
        }))
    }

    /// Load every decision record made for a task, in decision creation order.
    pub async fn load_by_task(&self, task_id: &str) -> GraphResult<Vec<DecisionRecord>> {
        validate_id(task_id)?;

        let decision_nodes = self
            .store
            .neighbors(NodeLabel::Task, task_id, RelKind::DecidedBy)
            .await?;

        let mut records = Vec::with_capacity(decision_nodes.len());
        for node in dedup_by_id(decision_nodes) {
            if let Some(record) = self.load_by_decision(&node.id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Check every id in the record before touching the store.
    fn validate_record_ids(&self, record: &DecisionRecord) -> GraphResult<()> {
        validate_id(&record.decision.id)?;
        validate_id(&record.decision.task_id)?;

        let claim_ids: HashSet<&str> = record
            .claims
            .iter()
            .map(|claim| {
                validate_id(&claim.id)?;
                Ok(claim.id.as_str())
            })
            .collect::<GraphResult<_>>()?;

        for item in &record.evidence {
            validate_id(&item.id)?;
            validate_id(&item.claim_id)?;
            if !claim_ids.contains(item.claim_id.as_str()) {
                return Err(GraphError::DanglingReference {
                    rel: RelKind::SupportedBy.to_string(),
                    label: NodeLabel::Claim.to_string(),
                    id: item.claim_id.clone(),
                });
            }
        }

        for verification in &record.verifications {
            validate_id(&verification.id)?;
        }

        Ok(())
    }
}

/// Serialize a record into a node's property map.
fn node_from<T: serde::Serialize>(
    label: NodeLabel,
    id: &str,
    value: &T,
) -> GraphResult<GraphNode> {
    let properties = serde_json::to_value(value).map_err(|e| GraphError::Query {
        message: format!("Failed to serialize {} properties: {}", label, e),
    })?;
    GraphNode::new(label, id, properties)
}

/// Deserialize a record out of a node's property map.
fn from_node<T: serde::de::DeserializeOwned>(node: &GraphNode) -> GraphResult<T> {
    serde_json::from_value(node.properties.clone()).map_err(|e| GraphError::Query {
        message: format!("Failed to deserialize {} node {}: {}", node.label, node.id, e),
    })
}

/// Drop duplicate nodes, keeping first occurrence so read order is stable.
fn dedup_by_id(nodes: Vec<GraphNode>) -> Vec<GraphNode> {
    let mut seen = HashSet::new();
    nodes
        .into_iter()
        .filter(|node| seen.insert(node.id.clone()))
        .collect()
}
