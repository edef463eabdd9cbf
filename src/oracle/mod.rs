//! Verifier oracle: the external judge of candidate outputs.
//!
//! The oracle is an opaque collaborator; this module defines the
//! [`VerifierOracle`] trait the pipeline consumes and an HTTP
//! implementation against an OpenAI-compatible completion endpoint.

mod client;
mod types;

pub use client::HttpVerifierOracle;
pub use types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Message, MessageRole,
    OracleJudgment, Usage,
};

use crate::error::OracleResult;

/// External verifier capability consumed by the verification pipeline.
///
/// Errors are reported as [`OracleError`](crate::error::OracleError)
/// values, never sentinel scores; the pipeline decides what degrades and
/// what propagates.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VerifierOracle: Send + Sync {
    /// Judge a candidate output. `prompt` embeds the schema and candidate;
    /// `model` selects the verifier model.
    async fn judge(&self, prompt: &str, model: &str) -> OracleResult<OracleJudgment>;
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Try parsing as raw JSON first (fast path)
/// 2. Extract from ```json ... ``` code blocks
/// 3. Extract from ``` ... ``` code blocks
/// 4. Return error if none work
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    // Fast path: raw JSON
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    // Try ```json ... ``` blocks
    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    // Try ``` ... ``` blocks
    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}
