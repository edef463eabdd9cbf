//! Decision lifecycle: the state machine that owns a [`DecisionRecord`]
//! from creation to its terminal outcome.
//!
//! Transitions are `CREATED -> EXECUTING -> SUCCEEDED | FAILED`, with
//! `FAILED -> EXECUTING` allowed for escalated retries. Every mutation of
//! the underlying record goes through this type so the escalation and
//! timestamp invariants hold at all times.

use chrono::Utc;
use tracing::debug;

use crate::error::{LifecycleError, LifecycleResult};
use crate::record::{Claim, DecisionRecord, Evidence, RouteDecision, Verification};

/// Where a decision sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    /// Routed but not yet executing.
    Created,
    /// Execution in flight.
    Executing,
    /// Execution finished and the outcome was good.
    Succeeded,
    /// Execution finished and the outcome was bad.
    Failed,
}

impl std::fmt::Display for DecisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionState::Created => write!(f, "created"),
            DecisionState::Executing => write!(f, "executing"),
            DecisionState::Succeeded => write!(f, "succeeded"),
            DecisionState::Failed => write!(f, "failed"),
        }
    }
}

/// Pure projection of a decision's identity and runtime numbers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerformanceMetrics {
    /// Task this decision routed.
    pub task_id: String,
    /// Strategy the decision used.
    pub strategy: crate::record::RouteStrategy,
    /// Model the decision currently targets.
    pub model: String,
    /// Whether the decision ultimately succeeded, once known.
    pub success: Option<bool>,
    /// Actual cost in USD.
    pub cost_usd: f64,
    /// Actual end-to-end latency in milliseconds.
    pub latency_ms: i64,
    /// Tokens consumed.
    pub tokens_used: i64,
    /// Task complexity estimate.
    pub complexity: f64,
    /// Task risk estimate.
    pub risk: f64,
    /// Calibrated confidence.
    pub confidence: f64,
    /// Escalations taken.
    pub escalation_count: u32,
    /// Claims recorded so far.
    pub claim_count: usize,
    /// Evidence items recorded so far.
    pub evidence_count: usize,
    /// Verification results recorded so far.
    pub verification_count: usize,
}

/// A [`DecisionRecord`] together with its current state and sealing flag.
///
/// Once the record has been persisted to the evidence graph it is sealed:
/// further claim, evidence, or verification appends are rejected so the
/// stored provenance cannot silently diverge from the in-memory copy.
#[derive(Debug, Clone)]
pub struct DecisionLifecycle {
    record: DecisionRecord,
    state: DecisionState,
    persisted: bool,
}

impl DecisionLifecycle {
    /// Wrap a freshly routed decision in the `Created` state.
    pub fn new(decision: RouteDecision) -> Self {
        Self {
            record: DecisionRecord::new(decision),
            state: DecisionState::Created,
            persisted: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DecisionState {
        self.state
    }

    /// Whether the record has been sealed by persistence.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Read access to the owned record.
    pub fn record(&self) -> &DecisionRecord {
        &self.record
    }

    /// The wrapped decision.
    pub fn decision(&self) -> &RouteDecision {
        &self.record.decision
    }

    /// Begin (or, after a failure, resume) execution.
    ///
    /// Valid from `Created` and from `Failed`; the latter is the escalation
    /// retry path. Sets `start_time` on the first call only, so retries keep
    /// the original start for end-to-end latency accounting.
    pub fn start_execution(&mut self) -> LifecycleResult<()> {
        match self.state {
            DecisionState::Created | DecisionState::Failed => {
                if self.record.decision.start_time.is_none() {
                    self.record.decision.start_time = Some(Utc::now());
                }
                self.record.decision.updated_at = Utc::now();
                self.state = DecisionState::Executing;
                debug!(
                    decision_id = %self.record.decision.id,
                    "Decision execution started"
                );
                Ok(())
            }
            state => Err(LifecycleError::InvalidTransition {
                action: "start_execution".to_string(),
                state: state.to_string(),
            }),
        }
    }

    /// Finish execution with its observed outcome and runtime numbers.
    ///
    /// Valid only from `Executing`. Moves to `Succeeded` or `Failed` and
    /// stamps `end_time`.
    pub fn complete_execution(
        &mut self,
        success: bool,
        cost_usd: f64,
        latency_ms: i64,
        tokens_used: i64,
        error_message: Option<String>,
    ) -> LifecycleResult<()> {
        if self.state != DecisionState::Executing {
            return Err(LifecycleError::InvalidTransition {
                action: "complete_execution".to_string(),
                state: self.state.to_string(),
            });
        }

        let now = Utc::now();
        let decision = &mut self.record.decision;
        decision.success = Some(success);
        decision.cost_actual_usd = cost_usd;
        decision.latency_actual_ms = latency_ms;
        decision.tokens_used = tokens_used;
        decision.error_message = error_message;
        decision.end_time = Some(now);
        decision.updated_at = now;

        self.state = if success {
            DecisionState::Succeeded
        } else {
            DecisionState::Failed
        };
        debug!(
            decision_id = %decision.id,
            success,
            cost_usd,
            latency_ms,
            "Decision execution completed"
        );
        Ok(())
    }

    /// Record an escalation step from one model to another.
    ///
    /// Appends `"{from}->{to}"` to the escalation path and bumps the count,
    /// keeping the two in lockstep, and retargets the decision to `to` so a
    /// subsequent [`start_execution`](Self::start_execution) retry runs
    /// against the escalated model. Allowed in any state: an escalation may
    /// be decided before, during, or after an execution attempt.
    pub fn add_escalation(&mut self, from: &str, to: &str) {
        let decision = &mut self.record.decision;
        decision.escalation_path.push(format!("{}->{}", from, to));
        decision.escalation_count += 1;
        decision.model = to.to_string();
        decision.updated_at = Utc::now();
        debug!(
            decision_id = %decision.id,
            from,
            to,
            escalation_count = decision.escalation_count,
            "Decision escalated"
        );
    }

    /// Update the decision's calibrated confidence.
    pub fn set_confidence(&mut self, confidence: f64) {
        self.record.decision.confidence = confidence.clamp(0.0, 1.0);
        self.touch();
    }

    /// Append a claim to the record.
    pub fn add_claim(&mut self, claim: Claim) -> LifecycleResult<()> {
        self.ensure_unsealed()?;
        self.record.claims.push(claim);
        self.touch();
        Ok(())
    }

    /// Append an evidence item to the record.
    pub fn add_evidence(&mut self, evidence: Evidence) -> LifecycleResult<()> {
        self.ensure_unsealed()?;
        self.record.evidence.push(evidence);
        self.touch();
        Ok(())
    }

    /// Append a verification result to the record.
    pub fn add_verification(&mut self, verification: Verification) -> LifecycleResult<()> {
        self.ensure_unsealed()?;
        self.record.verifications.push(verification);
        self.touch();
        Ok(())
    }

    /// Seal the record after it has been written to the evidence graph.
    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Project the decision's identity and runtime numbers.
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let decision = &self.record.decision;
        PerformanceMetrics {
            task_id: decision.task_id.clone(),
            strategy: decision.strategy,
            model: decision.model.clone(),
            success: decision.success,
            cost_usd: decision.cost_actual_usd,
            latency_ms: decision.latency_actual_ms,
            tokens_used: decision.tokens_used,
            complexity: decision.complexity,
            risk: decision.risk,
            confidence: decision.confidence,
            escalation_count: decision.escalation_count,
            claim_count: self.record.claims.len(),
            evidence_count: self.record.evidence.len(),
            verification_count: self.record.verifications.len(),
        }
    }

    fn ensure_unsealed(&self) -> LifecycleResult<()> {
        if self.persisted {
            return Err(LifecycleError::RecordSealed {
                decision_id: self.record.decision.id.clone(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.record.decision.updated_at = Utc::now();
    }
}
