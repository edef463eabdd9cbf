//! Centralized prompt definitions for the verifier oracle.

/// System prompt for the verifier model.
///
/// The user message carries the output schema and the candidate output;
/// this prompt pins down the judgment format.
pub const VERIFIER_SYSTEM_PROMPT: &str = r#"You are an independent output verifier. You are given an output schema and a candidate output produced by another model. Judge how well the candidate satisfies the schema's intent and whether its content is correct and internally consistent.

Your response MUST be valid JSON in this exact format:
{
  "score": 0.85,
  "rationale": "why the candidate earns this score",
  "agreement_rate": 0.9
}

Guidelines:
- score is your quality judgment between 0.0 and 1.0
- agreement_rate estimates the fraction of independent verifiers that would concur with you, between 0.0 and 1.0
- be specific in the rationale; cite the fields or statements that drive the score
- do not repair or rewrite the candidate

Always respond with valid JSON only, no other text."#;

/// Build the user message for one verification.
pub fn verifier_user_prompt(schema_json: &str, candidate_json: &str) -> String {
    format!(
        "Output schema:\n{}\n\nCandidate output:\n{}",
        schema_json, candidate_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_embeds_schema_and_candidate() {
        let prompt = verifier_user_prompt("{\"name\":\"answer\"}", "{\"value\":42}");
        assert!(prompt.contains("{\"name\":\"answer\"}"));
        assert!(prompt.contains("{\"value\":42}"));
    }
}
