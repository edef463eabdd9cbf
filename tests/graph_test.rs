//! Integration tests for the evidence graph.
//!
//! Exercises persistence, idempotent replay, and provenance loading against
//! an in-memory SQLite store, plus one file-backed round trip.

use std::sync::Arc;

use uuid::Uuid;

use decision_provenance::error::GraphError;
use decision_provenance::graph::{EvidenceGraph, GraphStore, NodeLabel, RelKind, SqliteGraph};
use decision_provenance::record::{
    Claim, DecisionRecord, Evidence, RouteDecision, RouteStrategy, SourceType, Verification,
    VerificationMethod,
};

/// Create an evidence graph over an in-memory store for testing
async fn create_test_graph() -> (EvidenceGraph, Arc<SqliteGraph>) {
    let store = Arc::new(
        SqliteGraph::new_in_memory()
            .await
            .expect("Failed to create in-memory graph store"),
    );
    (EvidenceGraph::new(store.clone()), store)
}

/// A record with two claims, three evidence items, and one verification
fn full_record() -> DecisionRecord {
    let decision = RouteDecision::new(
        Uuid::new_v4().to_string(),
        RouteStrategy::SolverVerifier,
        "gpt-4o-mini",
    )
    .with_verifier_model("gpt-4o")
    .with_reason("high-risk refactoring task");

    let mut record = DecisionRecord::new(decision);
    let first = Claim::new("the refactor preserves public API");
    let second = Claim::new("all call sites were updated");

    record.evidence.push(
        Evidence::new(&first.id, SourceType::Code, "src/api.rs").with_span(10, 42),
    );
    record.evidence.push(
        Evidence::new(&first.id, SourceType::Test, "tests/api_test.rs").with_score(0.9),
    );
    record
        .evidence
        .push(Evidence::new(&second.id, SourceType::Code, "src/callers.rs"));

    record.claims.push(first);
    record.claims.push(second);

    record.verifications.push(
        Verification::new(VerificationMethod::Composite, true, 0.97)
            .with_agreement_rate(0.9)
            .with_verifier_model("gpt-4o"),
    );
    record
}

mod persistence_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_persist_writes_full_provenance_chain() {
        let (graph, store) = create_test_graph().await;
        let record = full_record();

        graph.persist(&record).await.unwrap();

        assert_eq!(store.count_nodes(NodeLabel::Task).await.unwrap(), 1);
        assert_eq!(store.count_nodes(NodeLabel::Decision).await.unwrap(), 1);
        assert_eq!(store.count_nodes(NodeLabel::Claim).await.unwrap(), 2);
        assert_eq!(store.count_nodes(NodeLabel::Evidence).await.unwrap(), 3);
        assert_eq!(store.count_nodes(NodeLabel::Verification).await.unwrap(), 1);

        assert_eq!(store.count_edges(RelKind::DecidedBy).await.unwrap(), 1);
        assert_eq!(store.count_edges(RelKind::Asserts).await.unwrap(), 2);
        assert_eq!(store.count_edges(RelKind::SupportedBy).await.unwrap(), 3);
        assert_eq!(store.count_edges(RelKind::VerifiedBy).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replaying_persist_is_idempotent() {
        let (graph, store) = create_test_graph().await;
        let record = full_record();

        graph.persist(&record).await.unwrap();
        graph.persist(&record).await.unwrap();
        graph.persist(&record).await.unwrap();

        assert_eq!(store.count_nodes(NodeLabel::Decision).await.unwrap(), 1);
        assert_eq!(store.count_nodes(NodeLabel::Claim).await.unwrap(), 2);
        assert_eq!(store.count_nodes(NodeLabel::Evidence).await.unwrap(), 3);
        assert_eq!(store.count_edges(RelKind::Asserts).await.unwrap(), 2);
        assert_eq!(store.count_edges(RelKind::SupportedBy).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_replay_merges_updated_properties() {
        let (graph, store) = create_test_graph().await;
        let mut record = full_record();

        graph.persist(&record).await.unwrap();
        record.decision.confidence = 0.91;
        graph.persist(&record).await.unwrap();

        let loaded = graph
            .load_by_decision(&record.decision.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.decision.confidence, 0.91);
        assert_eq!(store.count_nodes(NodeLabel::Decision).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_decisions_for_one_task() {
        let (graph, store) = create_test_graph().await;
        let first = full_record();
        let mut second = full_record();
        second.decision.task_id = first.decision.task_id.clone();

        graph.persist(&first).await.unwrap();
        graph.persist(&second).await.unwrap();

        assert_eq!(store.count_nodes(NodeLabel::Task).await.unwrap(), 1);
        assert_eq!(store.count_edges(RelKind::DecidedBy).await.unwrap(), 2);

        let records = graph.load_by_task(&first.decision.task_id).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}

mod validation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_malformed_id_is_rejected_before_any_write() {
        let (graph, store) = create_test_graph().await;
        let mut record = full_record();
        record.claims[0].id = "claim-one".to_string();

        let err = graph.persist(&record).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidId { .. }));
        assert_eq!(store.count_nodes(NodeLabel::Task).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_evidence_for_unknown_claim_is_rejected() {
        let (graph, _) = create_test_graph().await;
        let mut record = full_record();
        record.evidence[0].claim_id = Uuid::new_v4().to_string();

        let err = graph.persist(&record).await.unwrap_err();
        assert!(matches!(err, GraphError::DanglingReference { .. }));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_id() {
        let (graph, _) = create_test_graph().await;
        let err = graph.load_by_decision("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidId { .. }));
    }
}

mod load_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_round_trip_preserves_append_order() {
        let (graph, _) = create_test_graph().await;
        let record = full_record();

        graph.persist(&record).await.unwrap();
        let loaded = graph
            .load_by_decision(&record.decision.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.decision.id, record.decision.id);
        assert_eq!(loaded.decision.reason, record.decision.reason);
        let claim_ids: Vec<&str> = loaded.claims.iter().map(|c| c.id.as_str()).collect();
        let expected: Vec<&str> = record.claims.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(claim_ids, expected);
        assert_eq!(loaded.evidence.len(), 3);
        assert_eq!(loaded.verifications.len(), 1);
        assert_eq!(loaded.verifications[0].method, VerificationMethod::Composite);
        assert!(loaded.verifications[0].passed);
    }

    #[tokio::test]
    async fn test_evidence_interleaved_across_claims_keeps_append_order() {
        let (graph, _) = create_test_graph().await;
        let decision = RouteDecision::new(
            Uuid::new_v4().to_string(),
            RouteStrategy::SolverVerifier,
            "gpt-4o-mini",
        );
        let mut record = DecisionRecord::new(decision);
        let first = Claim::new("first claim");
        let second = Claim::new("second claim");

        // Append order deliberately alternates between the two claims.
        record
            .evidence
            .push(Evidence::new(&first.id, SourceType::Code, "src/a.rs"));
        record
            .evidence
            .push(Evidence::new(&second.id, SourceType::Code, "src/b.rs"));
        record
            .evidence
            .push(Evidence::new(&first.id, SourceType::Test, "tests/a.rs"));
        record.claims.push(first);
        record.claims.push(second);

        graph.persist(&record).await.unwrap();
        let loaded = graph
            .load_by_decision(&record.decision.id)
            .await
            .unwrap()
            .unwrap();

        let loaded_ids: Vec<&str> = loaded.evidence.iter().map(|e| e.id.as_str()).collect();
        let expected: Vec<&str> = record.evidence.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(loaded_ids, expected);
    }

    #[tokio::test]
    async fn test_decision_without_provenance_loads_empty_collections() {
        let (graph, _) = create_test_graph().await;
        let record = DecisionRecord::new(RouteDecision::new(
            Uuid::new_v4().to_string(),
            RouteStrategy::Single,
            "gpt-4o-mini",
        ));

        graph.persist(&record).await.unwrap();
        let loaded = graph
            .load_by_decision(&record.decision.id)
            .await
            .unwrap()
            .unwrap();

        assert!(loaded.claims.is_empty());
        assert!(loaded.evidence.is_empty());
        assert!(loaded.verifications.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_decision_loads_none() {
        let (graph, _) = create_test_graph().await;
        let loaded = graph
            .load_by_decision(&Uuid::new_v4().to_string())
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_unknown_task_loads_empty_vec() {
        let (graph, _) = create_test_graph().await;
        let records = graph
            .load_by_task(&Uuid::new_v4().to_string())
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}

mod file_backed_tests {
    use super::*;
    use decision_provenance::config::GraphConfig;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig {
            path: dir.path().join("evidence.db"),
            max_connections: 5,
        };
        let record = full_record();

        {
            let store = Arc::new(SqliteGraph::new(&config).await.unwrap());
            let graph = EvidenceGraph::new(store);
            graph.persist(&record).await.unwrap();
        }

        let store = Arc::new(SqliteGraph::new(&config).await.unwrap());
        let graph = EvidenceGraph::new(store);
        let loaded = graph
            .load_by_decision(&record.decision.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.claims.len(), 2);
        assert_eq!(loaded.evidence.len(), 3);
    }
}
