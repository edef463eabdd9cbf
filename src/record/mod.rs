//! Evidence model: immutable value types for governed decisions.
//!
//! This module defines the typed records the kernel attaches to every
//! non-deterministic decision: the routed decision itself, the claims made
//! in its service, the evidence supporting those claims, and the outcomes
//! of verifying the decision's output. The types carry no behavior beyond
//! construction and invariant validation; mutation of runtime fields is the
//! business of the owning [`DecisionLifecycle`](crate::lifecycle::DecisionLifecycle).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ModelError;

/// Routing strategy chosen for a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// One sample, no aggregation.
    #[default]
    Single,
    /// Multiple samples with majority agreement.
    SelfConsistency,
    /// Solver output checked by an independent verifier model.
    SolverVerifier,
    /// Branching deliberate search.
    TreeOfThought,
    /// Adversarial multi-model debate.
    Debate,
    /// Iterative self-critique and retry.
    Reflexion,
}

impl std::fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteStrategy::Single => write!(f, "single"),
            RouteStrategy::SelfConsistency => write!(f, "self_consistency"),
            RouteStrategy::SolverVerifier => write!(f, "solver_verifier"),
            RouteStrategy::TreeOfThought => write!(f, "tree_of_thought"),
            RouteStrategy::Debate => write!(f, "debate"),
            RouteStrategy::Reflexion => write!(f, "reflexion"),
        }
    }
}

impl std::str::FromStr for RouteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(RouteStrategy::Single),
            "self_consistency" => Ok(RouteStrategy::SelfConsistency),
            "solver_verifier" => Ok(RouteStrategy::SolverVerifier),
            "tree_of_thought" => Ok(RouteStrategy::TreeOfThought),
            "debate" => Ok(RouteStrategy::Debate),
            "reflexion" => Ok(RouteStrategy::Reflexion),
            _ => Err(format!("Unknown route strategy: {}", s)),
        }
    }
}

/// Kind of source an evidence item was retrieved from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Local file content.
    #[default]
    File,
    /// Web resource.
    Web,
    /// Source code.
    Code,
    /// Test output.
    Test,
    /// Free-form note.
    Note,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::File => write!(f, "file"),
            SourceType::Web => write!(f, "web"),
            SourceType::Code => write!(f, "code"),
            SourceType::Test => write!(f, "test"),
            SourceType::Note => write!(f, "note"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(SourceType::File),
            "web" => Ok(SourceType::Web),
            "code" => Ok(SourceType::Code),
            "test" => Ok(SourceType::Test),
            "note" => Ok(SourceType::Note),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Method used to check a decision's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Structural validation against an output schema.
    #[default]
    Schema,
    /// Judgment by an independent verifier model.
    VerifierModel,
    /// Execution of tests against the output.
    Tests,
    /// Schema stage combined with a verifier-model stage.
    Composite,
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMethod::Schema => write!(f, "schema"),
            VerificationMethod::VerifierModel => write!(f, "verifier_model"),
            VerificationMethod::Tests => write!(f, "tests"),
            VerificationMethod::Composite => write!(f, "composite"),
        }
    }
}

impl std::str::FromStr for VerificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "schema" => Ok(VerificationMethod::Schema),
            "verifier_model" => Ok(VerificationMethod::VerifierModel),
            "tests" => Ok(VerificationMethod::Tests),
            "composite" => Ok(VerificationMethod::Composite),
            _ => Err(format!("Unknown verification method: {}", s)),
        }
    }
}

/// SHA-256 hex digest of a text payload.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One governed routing decision.
///
/// The serialized form of this struct is exactly the property map of the
/// `Decision` graph node, so the record round-trips through the store
/// without a separate mapping layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Unique decision identifier.
    pub id: String,
    /// Identifier of the task this decision routes.
    pub task_id: String,
    /// Chosen routing strategy.
    pub strategy: RouteStrategy,
    /// Model identifier the task was routed to.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Number of samples drawn.
    pub sample_count: u32,
    /// Budget of intermediate thoughts for deliberate strategies.
    pub max_thoughts: u32,
    /// Independent verifier model, when one is assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_model: Option<String>,
    /// Estimated probability the routed output passes verification (0.0-1.0).
    pub p_pass: f64,
    /// Calibrated confidence in the decision (0.0-1.0).
    pub confidence: f64,
    /// Free-text justification for the routing choice.
    pub reason: String,
    /// Arbitrary strategy parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Actual cost in USD once execution completes.
    pub cost_actual_usd: f64,
    /// Actual end-to-end latency in milliseconds.
    pub latency_actual_ms: i64,
    /// Tokens consumed by execution.
    pub tokens_used: i64,
    /// Task complexity estimate (0.0-1.0).
    pub complexity: f64,
    /// Task risk estimate (0.0-1.0).
    pub risk: f64,
    /// Target latency budget in milliseconds.
    pub latency_budget_ms: i64,
    /// Number of escalations taken so far.
    pub escalation_count: u32,
    /// Ordered escalation path, entries formatted `"from->to"`.
    pub escalation_path: Vec<String>,
    /// When execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// When execution ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whether execution succeeded, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Error message from a failed execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the decision was created.
    pub created_at: DateTime<Utc>,
    /// When the decision was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl RouteDecision {
    /// Create a new decision routing `task_id` to `model` with `strategy`.
    pub fn new(
        task_id: impl Into<String>,
        strategy: RouteStrategy,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            strategy,
            model: model.into(),
            temperature: 0.7,
            sample_count: 1,
            max_thoughts: 0,
            verifier_model: None,
            p_pass: 0.5,
            confidence: 0.5,
            reason: String::new(),
            params: None,
            cost_actual_usd: 0.0,
            latency_actual_ms: 0,
            tokens_used: 0,
            complexity: 0.0,
            risk: 0.0,
            latency_budget_ms: 0,
            escalation_count: 0,
            escalation_path: Vec::new(),
            start_time: None,
            end_time: None,
            success: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the sampling parameters.
    pub fn with_sampling(mut self, temperature: f64, sample_count: u32, max_thoughts: u32) -> Self {
        self.temperature = temperature;
        self.sample_count = sample_count;
        self.max_thoughts = max_thoughts;
        self
    }

    /// Set the verifier model.
    pub fn with_verifier_model(mut self, model: impl Into<String>) -> Self {
        self.verifier_model = Some(model.into());
        self
    }

    /// Set the probability-of-pass estimate.
    pub fn with_p_pass(mut self, p_pass: f64) -> Self {
        self.p_pass = p_pass.clamp(0.0, 1.0);
        self
    }

    /// Set the calibrated confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the routing justification.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set arbitrary strategy parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Set complexity and risk estimates.
    pub fn with_scores(mut self, complexity: f64, risk: f64) -> Self {
        self.complexity = complexity.clamp(0.0, 1.0);
        self.risk = risk.clamp(0.0, 1.0);
        self
    }

    /// Set the target latency budget.
    pub fn with_latency_budget(mut self, budget_ms: i64) -> Self {
        self.latency_budget_ms = budget_ms;
        self
    }

    /// Check the decision's own invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ModelError::Validation {
                field: "confidence".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.p_pass) {
            return Err(ModelError::Validation {
                field: "p_pass".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(ModelError::Validation {
                    field: "end_time".to_string(),
                    reason: "must not precede start_time".to_string(),
                });
            }
        }

        if self.escalation_count as usize != self.escalation_path.len() {
            return Err(ModelError::Validation {
                field: "escalation_count".to_string(),
                reason: format!(
                    "count {} does not match path length {}",
                    self.escalation_count,
                    self.escalation_path.len()
                ),
            });
        }

        Ok(())
    }
}

/// An assertion made in service of a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Unique claim identifier.
    pub id: String,
    /// The asserted text.
    pub text: String,
    /// SHA-256 hex digest of `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// When the claim was recorded.
    pub created_at: DateTime<Utc>,
}

impl Claim {
    /// Create a new claim, hashing its text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = content_hash(&text);
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            hash: Some(hash),
            created_at: Utc::now(),
        }
    }

    /// Check that the stored hash, if present, matches the text.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(hash) = &self.hash {
            if *hash != content_hash(&self.text) {
                return Err(ModelError::Validation {
                    field: "hash".to_string(),
                    reason: "does not match digest of text".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A unit of support for a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique evidence identifier.
    pub id: String,
    /// Identifier of the claim this evidence supports.
    pub claim_id: String,
    /// Kind of source the evidence came from.
    pub source_type: SourceType,
    /// URI of the source.
    pub uri: String,
    /// SHA-256 hex digest of the retrieved content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Relevance score (0.0-1.0).
    pub score: f64,
    /// Start offset of the supporting span within the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_start: Option<i64>,
    /// End offset of the supporting span within the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_end: Option<i64>,
    /// When the evidence was retrieved.
    pub retrieved_at: DateTime<Utc>,
    /// Optional free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Evidence {
    /// Create a new evidence item supporting `claim_id`.
    pub fn new(
        claim_id: impl Into<String>,
        source_type: SourceType,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            claim_id: claim_id.into(),
            source_type,
            uri: uri.into(),
            sha256: None,
            score: 0.5,
            span_start: None,
            span_end: None,
            retrieved_at: Utc::now(),
            metadata: None,
        }
    }

    /// Set the content digest from the retrieved text.
    pub fn with_content(mut self, content: &str) -> Self {
        self.sha256 = Some(content_hash(content));
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }

    /// Set the supporting span offsets.
    pub fn with_span(mut self, start: i64, end: i64) -> Self {
        self.span_start = Some(start);
        self.span_end = Some(end);
        self
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check span ordering.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let (Some(start), Some(end)) = (self.span_start, self.span_end) {
            if end < start {
                return Err(ModelError::Validation {
                    field: "span_end".to_string(),
                    reason: "must not precede span_start".to_string(),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(ModelError::Validation {
                field: "score".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

/// The result of checking a decision's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// Unique verification identifier.
    pub id: String,
    /// Method that produced this result.
    pub method: VerificationMethod,
    /// Whether the check passed.
    pub passed: bool,
    /// Combined score (0.0-1.0).
    pub score: f64,
    /// Human-readable rationale.
    pub rationale: String,
    /// Agreement rate with an independent verifier (0.0-1.0).
    pub agreement_rate: f64,
    /// Verifier model that judged the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_model: Option<String>,
    /// Verification duration in milliseconds.
    pub duration_ms: i64,
    /// Number of repair attempts made before this result.
    pub repair_attempts: u32,
    /// When the verification was recorded.
    pub created_at: DateTime<Utc>,
}

impl Verification {
    /// Create a new verification result.
    pub fn new(method: VerificationMethod, passed: bool, score: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            passed,
            score: score.clamp(0.0, 1.0),
            rationale: String::new(),
            agreement_rate: 0.0,
            verifier_model: None,
            duration_ms: 0,
            repair_attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the rationale.
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Set the agreement rate.
    pub fn with_agreement_rate(mut self, rate: f64) -> Self {
        self.agreement_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the verifier model.
    pub fn with_verifier_model(mut self, model: impl Into<String>) -> Self {
        self.verifier_model = Some(model.into());
        self
    }

    /// Set the measured duration.
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Set the repair-attempt counter.
    pub fn with_repair_attempts(mut self, attempts: u32) -> Self {
        self.repair_attempts = attempts;
        self
    }
}

/// Aggregate root: one decision with its claims, evidence, and verifications.
///
/// Collections are append-ordered; insertion order is semantically
/// meaningful for audit replay and is preserved through persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// The governed decision.
    pub decision: RouteDecision,
    /// Claims asserted by the decision, in append order.
    pub claims: Vec<Claim>,
    /// Evidence supporting the claims, in append order.
    pub evidence: Vec<Evidence>,
    /// Verification results, in append order.
    pub verifications: Vec<Verification>,
}

impl DecisionRecord {
    /// Create a record around a freshly routed decision.
    pub fn new(decision: RouteDecision) -> Self {
        Self {
            decision,
            claims: Vec::new(),
            evidence: Vec::new(),
            verifications: Vec::new(),
        }
    }

    /// Validate the decision and every owned entity.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.decision.validate()?;
        for claim in &self.claims {
            claim.validate()?;
        }
        for item in &self.evidence {
            item.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_strategy_display_round_trip() {
        for strategy in [
            RouteStrategy::Single,
            RouteStrategy::SelfConsistency,
            RouteStrategy::SolverVerifier,
            RouteStrategy::TreeOfThought,
            RouteStrategy::Debate,
            RouteStrategy::Reflexion,
        ] {
            let parsed = RouteStrategy::from_str(&strategy.to_string()).unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!(RouteStrategy::from_str("bogus").is_err());
    }

    #[test]
    fn test_source_type_round_trip() {
        for source in [
            SourceType::File,
            SourceType::Web,
            SourceType::Code,
            SourceType::Test,
            SourceType::Note,
        ] {
            assert_eq!(SourceType::from_str(&source.to_string()).unwrap(), source);
        }
    }

    #[test]
    fn test_verification_method_round_trip() {
        for method in [
            VerificationMethod::Schema,
            VerificationMethod::VerifierModel,
            VerificationMethod::Tests,
            VerificationMethod::Composite,
        ] {
            assert_eq!(
                VerificationMethod::from_str(&method.to_string()).unwrap(),
                method
            );
        }
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        // Known SHA-256 of "abc"
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_claim_hash_matches_text() {
        let claim = Claim::new("the parser terminates on all inputs");
        assert!(claim.validate().is_ok());

        let mut tampered = claim;
        tampered.text = "a different assertion".to_string();
        assert!(tampered.validate().is_err());
    }

    #[test]
    fn test_decision_builders_clamp_scores() {
        let decision = RouteDecision::new("task-1", RouteStrategy::Single, "gpt-4o-mini")
            .with_p_pass(1.5)
            .with_confidence(-0.2)
            .with_scores(2.0, -1.0);

        assert_eq!(decision.p_pass, 1.0);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.complexity, 1.0);
        assert_eq!(decision.risk, 0.0);
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_decision_time_invariant() {
        let mut decision = RouteDecision::new("task-1", RouteStrategy::Single, "m");
        decision.start_time = Some(Utc::now());
        decision.end_time = Some(decision.start_time.unwrap() - chrono::Duration::seconds(1));
        assert!(decision.validate().is_err());

        decision.end_time = Some(decision.start_time.unwrap() + chrono::Duration::seconds(1));
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_decision_escalation_invariant() {
        let mut decision = RouteDecision::new("task-1", RouteStrategy::Single, "m");
        decision.escalation_path.push("a->b".to_string());
        assert!(decision.validate().is_err());

        decision.escalation_count = 1;
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_evidence_span_invariant() {
        let evidence = Evidence::new(Uuid::new_v4().to_string(), SourceType::File, "src/lib.rs")
            .with_span(10, 5);
        assert!(evidence.validate().is_err());

        let evidence = Evidence::new(Uuid::new_v4().to_string(), SourceType::File, "src/lib.rs")
            .with_span(5, 10);
        assert!(evidence.validate().is_ok());
    }

    #[test]
    fn test_evidence_content_digest() {
        let evidence = Evidence::new(Uuid::new_v4().to_string(), SourceType::Web, "https://x")
            .with_content("abc");
        assert_eq!(evidence.sha256.as_deref(), Some(content_hash("abc").as_str()));
    }

    #[test]
    fn test_verification_clamps_score() {
        let verification = Verification::new(VerificationMethod::Composite, true, 1.7)
            .with_agreement_rate(-0.3);
        assert_eq!(verification.score, 1.0);
        assert_eq!(verification.agreement_rate, 0.0);
    }

    #[test]
    fn test_decision_serializes_with_snake_case_enums() {
        let decision = RouteDecision::new("t", RouteStrategy::SolverVerifier, "m");
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["strategy"], "solver_verifier");
        assert_eq!(value["task_id"], "t");
    }

    #[test]
    fn test_record_validates_children() {
        let decision = RouteDecision::new("t", RouteStrategy::Single, "m");
        let mut record = DecisionRecord::new(decision);
        let claim = Claim::new("claim text");
        let mut bad_evidence = Evidence::new(&claim.id, SourceType::Note, "note://1");
        bad_evidence.span_start = Some(9);
        bad_evidence.span_end = Some(3);
        record.claims.push(claim);
        record.evidence.push(bad_evidence);

        assert!(record.validate().is_err());
    }
}
