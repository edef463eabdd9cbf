//! # Decision Provenance Kernel
//!
//! A verification and evidence-provenance kernel for governed,
//! non-deterministic decisions: every routed decision carries typed claims,
//! supporting evidence, and verification results, all persisted to a
//! queryable evidence graph.
//!
//! ## Features
//!
//! - **Evidence Model**: Typed decision, claim, evidence, and verification
//!   records with invariant validation and content hashing
//! - **Verification Pipeline**: Fail-fast schema stage plus an independent
//!   verifier-model stage, combined into one scored, thresholded result
//! - **Confidence Calibration**: Fixed-order blending of verifier, critic,
//!   and agreement signals
//! - **Decision Lifecycle**: State machine guarding execution transitions
//!   and escalation bookkeeping
//! - **Evidence Graph**: Idempotent, merge-based persistence of the full
//!   provenance chain over a SQLite property graph
//! - **Metrics**: Pass/fail/cancellation counters and per-stage latency
//!   histograms with a Prometheus text exposition
//!
//! ## Architecture
//!
//! ```text
//! DecisionKernel → VerificationPipeline → VerifierOracle (HTTP)
//!        ↓                  ↓
//!  EvidenceGraph       MetricsSink
//!        ↓
//!  SQLite (nodes + edges)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use decision_provenance::record::{RouteDecision, RouteStrategy};
//! use decision_provenance::verify::{FieldType, SchemaSpec};
//! use decision_provenance::{Config, DecisionKernel, DecisionLifecycle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let kernel = DecisionKernel::connect(&config).await?;
//!
//!     let decision = RouteDecision::new(task_id, RouteStrategy::SolverVerifier, "gpt-4o-mini")
//!         .with_verifier_model("gpt-4o");
//!     let mut lifecycle = DecisionLifecycle::new(decision);
//!     lifecycle.start_execution()?;
//!
//!     let schema = SchemaSpec::new("answer").require("text", FieldType::String);
//!     let verification = kernel.verify_and_record(&mut lifecycle, &output, &schema).await?;
//!     lifecycle.complete_execution(verification.passed, 0.01, 900, 1500, None)?;
//!     kernel.persist(&mut lifecycle).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Confidence calibration from verification signals.
pub mod calibrate;
/// Configuration management for the kernel.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Evidence graph vocabulary, storage trait, and SQLite backend.
pub mod graph;
/// The kernel composition root.
pub mod kernel;
/// Decision lifecycle state machine.
pub mod lifecycle;
/// Verification counters and latency histograms.
pub mod metrics;
/// Verifier oracle trait, HTTP client, and wire types.
pub mod oracle;
/// System prompts for the verifier oracle.
pub mod prompts;
/// Evidence model: decision, claim, evidence, and verification records.
pub mod record;
/// Verification pipeline and output schemas.
pub mod verify;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use kernel::DecisionKernel;
pub use lifecycle::{DecisionLifecycle, DecisionState};
