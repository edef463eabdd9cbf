//! Verification pipeline: schema stage, verifier-oracle stage, combined score.
//!
//! The pipeline never raises past its boundary for ordinary failures: schema
//! violations are first-class `passed=false` results, oracle errors degrade
//! to a neutral verifier score, and any internal failure is converted into a
//! failed [`Verification`] by [`VerificationPipeline::run`]. The single
//! exception is cancellation, which propagates so callers can tell an
//! aborted verification from a failed one.

mod schema;

pub use schema::{FieldSpec, FieldType, SchemaSpec};

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::PolicyConfig;
use crate::error::{AppError, AppResult, OracleError};
use crate::metrics::{MetricsSink, PipelineStage};
use crate::oracle::VerifierOracle;
use crate::prompts::verifier_user_prompt;
use crate::record::{Verification, VerificationMethod};

/// Verifier score substituted when the oracle fails non-fatally.
const DEGRADED_VERIFIER_SCORE: f64 = 0.5;

/// Separator between stage rationales in the combined rationale.
const RATIONALE_SEPARATOR: &str = " | ";

/// Guard against float noise at the exact pass boundary.
const PASS_EPSILON: f64 = 1e-9;

/// Multi-stage verification of a candidate output.
#[derive(Clone)]
pub struct VerificationPipeline {
    oracle: Arc<dyn VerifierOracle>,
    metrics: MetricsSink,
    policy: PolicyConfig,
}

impl VerificationPipeline {
    /// Create a pipeline over the given oracle, sink, and policy.
    pub fn new(oracle: Arc<dyn VerifierOracle>, metrics: MetricsSink, policy: PolicyConfig) -> Self {
        Self {
            oracle,
            metrics,
            policy,
        }
    }

    /// The policy this pipeline scores against.
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Verify a candidate output, absorbing every failure except cancellation.
    ///
    /// Always emits a total-duration observation and exactly one of the
    /// pass/fail/cancellation counters. Returns `Err` only for a cancelled
    /// oracle call; any other internal failure comes back as a failed
    /// [`Verification`] so callers always receive a complete result object.
    pub async fn run(
        &self,
        output: &serde_json::Value,
        schema: &SchemaSpec,
        verifier_model: &str,
    ) -> AppResult<Verification> {
        let start = Instant::now();
        let result = self.verify(output, schema, verifier_model, start).await;
        self.metrics
            .observe_duration(PipelineStage::Total, start.elapsed());

        match result {
            Ok(verification) => {
                if verification.passed {
                    self.metrics.record_pass();
                } else {
                    self.metrics.record_failure();
                }
                // Disagreement is only meaningful when the verifier stage
                // actually produced a judgment; a schema fail-fast never
                // measured agreement.
                if verification.method == VerificationMethod::Composite
                    && verification.agreement_rate < self.policy.disagreement_threshold
                {
                    self.metrics.record_disagreement();
                }
                Ok(verification)
            }
            Err(err) if err.is_cancellation() => {
                self.metrics.record_cancellation();
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "Verification pipeline failed; recording failed result");
                self.metrics.record_failure();
                Ok(Verification::new(VerificationMethod::Composite, false, 0.0)
                    .with_rationale(err.to_string())
                    .with_agreement_rate(0.0)
                    .with_verifier_model(verifier_model)
                    .with_duration_ms(start.elapsed().as_millis() as i64))
            }
        }
    }

    /// The two verification stages plus the combine step.
    async fn verify(
        &self,
        output: &serde_json::Value,
        schema: &SchemaSpec,
        verifier_model: &str,
        start: Instant,
    ) -> AppResult<Verification> {
        // Stage 1: schema validation. A violation fails fast; the oracle
        // is never consulted about an output with the wrong shape.
        let schema_start = Instant::now();
        let schema_result = schema.validate(output);
        self.metrics
            .observe_duration(PipelineStage::Schema, schema_start.elapsed());

        let schema_rationale = match schema_result {
            Ok(()) => format!("schema '{}' valid", schema.name),
            Err(violations) => {
                debug!(schema = %schema.name, %violations, "Schema stage failed");
                return Ok(Verification::new(VerificationMethod::Schema, false, 0.0)
                    .with_rationale(format!("schema '{}' invalid: {}", schema.name, violations))
                    .with_agreement_rate(0.0)
                    .with_verifier_model(verifier_model)
                    .with_duration_ms(start.elapsed().as_millis() as i64));
            }
        };
        let schema_score = 1.0;

        // Stage 2: verifier oracle. Errors degrade to a neutral score;
        // cancellation propagates.
        let schema_json = serde_json::to_string(schema).unwrap_or_else(|_| schema.name.clone());
        let candidate_json =
            serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
        let prompt = verifier_user_prompt(&schema_json, &candidate_json);

        let verifier_start = Instant::now();
        let oracle_result = self.oracle.judge(&prompt, verifier_model).await;
        self.metrics
            .observe_duration(PipelineStage::Verifier, verifier_start.elapsed());

        let (verifier_score, verifier_rationale, agreement_rate) = match oracle_result {
            Ok(judgment) => (judgment.score, judgment.rationale, judgment.agreement_rate),
            Err(OracleError::Cancelled) => return Err(AppError::Oracle(OracleError::Cancelled)),
            Err(err) => {
                warn!(error = %err, model = %verifier_model, "Verifier degraded to neutral score");
                (
                    DEGRADED_VERIFIER_SCORE,
                    format!("verifier unavailable: {}", err),
                    0.0,
                )
            }
        };

        // Stage 3: combine.
        let combined =
            self.policy.schema_weight * schema_score + self.policy.verifier_weight * verifier_score;
        let passed = combined >= self.policy.pass_threshold - PASS_EPSILON;
        let rationale = format!(
            "{}{}{}",
            schema_rationale, RATIONALE_SEPARATOR, verifier_rationale
        );

        debug!(
            schema_score,
            verifier_score,
            combined,
            passed,
            agreement_rate,
            "Verification combined"
        );

        Ok(
            Verification::new(VerificationMethod::Composite, passed, combined)
                .with_rationale(rationale)
                .with_agreement_rate(agreement_rate)
                .with_verifier_model(verifier_model)
                .with_duration_ms(start.elapsed().as_millis() as i64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MockVerifierOracle, OracleJudgment};
    use serde_json::json;

    fn schema() -> SchemaSpec {
        SchemaSpec::new("answer").require("answer", FieldType::String)
    }

    fn pipeline_with(oracle: MockVerifierOracle) -> (VerificationPipeline, MetricsSink) {
        let metrics = MetricsSink::new();
        let pipeline = VerificationPipeline::new(
            Arc::new(oracle),
            metrics.clone(),
            PolicyConfig::default(),
        );
        (pipeline, metrics)
    }

    #[tokio::test]
    async fn test_schema_failure_skips_oracle() {
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().times(0);
        let (pipeline, metrics) = pipeline_with(oracle);

        let verification = pipeline
            .run(&json!({"wrong": true}), &schema(), "verifier-model")
            .await
            .unwrap();

        assert!(!verification.passed);
        assert_eq!(verification.score, 0.0);
        assert_eq!(verification.method, VerificationMethod::Schema);
        assert!(verification.rationale.contains("invalid"));
        assert_eq!(metrics.snapshot().failed, 1);
        assert_eq!(metrics.snapshot().passed, 0);
    }

    #[tokio::test]
    async fn test_passing_verification_combines_scores() {
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().times(1).returning(|_, _| {
            Ok(OracleJudgment {
                score: 0.95,
                rationale: "solid".to_string(),
                agreement_rate: 0.9,
            })
        });
        let (pipeline, metrics) = pipeline_with(oracle);

        let verification = pipeline
            .run(&json!({"answer": "42"}), &schema(), "verifier-model")
            .await
            .unwrap();

        assert!(verification.passed);
        assert!((verification.score - 0.97).abs() < 1e-9);
        assert_eq!(verification.method, VerificationMethod::Composite);
        assert!(verification.rationale.contains("valid"));
        assert!(verification.rationale.contains(" | "));
        assert!(verification.rationale.contains("solid"));
        assert_eq!(verification.agreement_rate, 0.9);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passed, 1);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.disagreements, 0);
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        // Exactly at the 0.8 threshold: passes.
        let boundary_score = 0.4 / 0.6;
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().returning(move |_, _| {
            Ok(OracleJudgment {
                score: boundary_score,
                rationale: "borderline".to_string(),
                agreement_rate: 0.9,
            })
        });
        let (pipeline, _) = pipeline_with(oracle);
        let verification = pipeline
            .run(&json!({"answer": "x"}), &schema(), "m")
            .await
            .unwrap();
        assert!(verification.passed, "combined score of exactly 0.8 passes");

        // Just below: fails.
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().returning(|_, _| {
            Ok(OracleJudgment {
                score: 0.6665,
                rationale: "just short".to_string(),
                agreement_rate: 0.9,
            })
        });
        let (pipeline, _) = pipeline_with(oracle);
        let verification = pipeline
            .run(&json!({"answer": "x"}), &schema(), "m")
            .await
            .unwrap();
        assert!(
            !verification.passed,
            "combined score of 0.7999 must not pass"
        );
    }

    #[tokio::test]
    async fn test_oracle_error_degrades_to_neutral_score() {
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().returning(|_, _| {
            Err(crate::error::OracleError::Timeout { timeout_ms: 100 })
        });
        let (pipeline, metrics) = pipeline_with(oracle);

        let verification = pipeline
            .run(&json!({"answer": "x"}), &schema(), "m")
            .await
            .unwrap();

        // 0.4*1.0 + 0.6*0.5 = 0.7 < 0.8
        assert!(!verification.passed);
        assert!((verification.score - 0.7).abs() < 1e-9);
        assert!(verification.rationale.contains("verifier unavailable"));
        assert_eq!(verification.agreement_rate, 0.0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.disagreements, 1);
        assert_eq!(snapshot.cancelled, 0);
    }

    #[tokio::test]
    async fn test_cancellation_propagates_without_failure_count() {
        let mut oracle = MockVerifierOracle::new();
        oracle
            .expect_judge()
            .returning(|_, _| Err(crate::error::OracleError::Cancelled));
        let (pipeline, metrics) = pipeline_with(oracle);

        let result = pipeline.run(&json!({"answer": "x"}), &schema(), "m").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_cancellation());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed, 0, "cancellation is not a failure");
        assert_eq!(snapshot.passed, 0);
        assert_eq!(snapshot.cancelled, 1);
    }

    #[tokio::test]
    async fn test_disagreement_counter_independent_of_pass() {
        // Passes, but with low agreement.
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().returning(|_, _| {
            Ok(OracleJudgment {
                score: 1.0,
                rationale: "confident but contested".to_string(),
                agreement_rate: 0.5,
            })
        });
        let (pipeline, metrics) = pipeline_with(oracle);

        let verification = pipeline
            .run(&json!({"answer": "x"}), &schema(), "m")
            .await
            .unwrap();

        assert!(verification.passed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passed, 1);
        assert_eq!(snapshot.disagreements, 1);
    }

    #[tokio::test]
    async fn test_duration_observed_on_all_stages() {
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().returning(|_, _| {
            Ok(OracleJudgment {
                score: 0.9,
                rationale: "fine".to_string(),
                agreement_rate: 0.9,
            })
        });
        let (pipeline, metrics) = pipeline_with(oracle);

        pipeline
            .run(&json!({"answer": "x"}), &schema(), "m")
            .await
            .unwrap();

        assert_eq!(metrics.observation_count(PipelineStage::Schema), 1);
        assert_eq!(metrics.observation_count(PipelineStage::Verifier), 1);
        assert_eq!(metrics.observation_count(PipelineStage::Total), 1);
    }

    #[tokio::test]
    async fn test_schema_failure_observes_total_duration() {
        let mut oracle = MockVerifierOracle::new();
        oracle.expect_judge().times(0);
        let (pipeline, metrics) = pipeline_with(oracle);

        pipeline.run(&json!([]), &schema(), "m").await.unwrap();

        assert_eq!(metrics.observation_count(PipelineStage::Schema), 1);
        assert_eq!(metrics.observation_count(PipelineStage::Verifier), 0);
        assert_eq!(metrics.observation_count(PipelineStage::Total), 1);
    }
}
