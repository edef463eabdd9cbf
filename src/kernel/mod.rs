//! Kernel: the composition root tying verification, calibration, and the
//! evidence graph together around a decision lifecycle.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::calibrate::calibrate;
use crate::config::Config;
use crate::error::AppResult;
use crate::graph::{EvidenceGraph, SqliteGraph};
use crate::lifecycle::DecisionLifecycle;
use crate::metrics::MetricsSink;
use crate::oracle::{HttpVerifierOracle, VerifierOracle};
use crate::record::Verification;
use crate::verify::{SchemaSpec, VerificationPipeline};

/// Verification and provenance services for governed decisions.
pub struct DecisionKernel {
    pipeline: VerificationPipeline,
    graph: EvidenceGraph,
    metrics: MetricsSink,
}

impl DecisionKernel {
    /// Assemble a kernel from already-built parts.
    pub fn new(pipeline: VerificationPipeline, graph: EvidenceGraph, metrics: MetricsSink) -> Self {
        Self {
            pipeline,
            graph,
            metrics,
        }
    }

    /// Assemble a kernel from configuration: HTTP oracle, SQLite-backed
    /// evidence graph, fresh metrics sink.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let oracle: Arc<dyn VerifierOracle> = Arc::new(HttpVerifierOracle::new(
            &config.verifier,
            config.request.clone(),
        )?);
        let store = Arc::new(SqliteGraph::new(&config.graph).await?);

        let metrics = MetricsSink::new();
        let pipeline = VerificationPipeline::new(oracle, metrics.clone(), config.policy);
        let graph = EvidenceGraph::new(store);

        info!("Decision kernel connected");
        Ok(Self::new(pipeline, graph, metrics))
    }

    /// The evidence graph this kernel persists to.
    #[inline]
    pub fn graph(&self) -> &EvidenceGraph {
        &self.graph
    }

    /// The metrics sink shared with the pipeline.
    #[inline]
    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// Verify a decision's candidate output and fold the result into its
    /// lifecycle.
    ///
    /// Runs the pipeline against the decision's verifier model (falling back
    /// to its routed model), appends the verification to the record, and
    /// recalibrates the decision's confidence from the verification score
    /// and agreement rate. Cancellation propagates without touching the
    /// record.
    pub async fn verify_and_record(
        &self,
        lifecycle: &mut DecisionLifecycle,
        output: &Value,
        schema: &SchemaSpec,
    ) -> AppResult<Verification> {
        let decision = lifecycle.decision();
        let verifier_model = decision
            .verifier_model
            .clone()
            .unwrap_or_else(|| decision.model.clone());

        let verification = self.pipeline.run(output, schema, &verifier_model).await?;

        let confidence = calibrate(
            verification.score,
            None,
            Some(verification.agreement_rate),
        );
        lifecycle.set_confidence(confidence);
        lifecycle.add_verification(verification.clone())?;

        Ok(verification)
    }

    /// Persist the lifecycle's record to the evidence graph and seal it.
    ///
    /// Graph errors propagate unmodified and leave the record unsealed, so
    /// a caller may retry persistence after a transient store failure.
    pub async fn persist(&self, lifecycle: &mut DecisionLifecycle) -> AppResult<()> {
        self.graph.persist(lifecycle.record()).await?;
        lifecycle.mark_persisted();
        Ok(())
    }
}
