//! Confidence calibration: blending verification signals into one score.

/// Weight of the running score when blending in a critic score.
pub const CRITIC_BASE_WEIGHT: f64 = 0.6;
/// Weight of the critic score.
pub const CRITIC_WEIGHT: f64 = 0.4;
/// Weight of the running score when blending in an agreement rate.
pub const AGREEMENT_BASE_WEIGHT: f64 = 0.7;
/// Weight of the agreement rate.
pub const AGREEMENT_WEIGHT: f64 = 0.3;

/// Combine up to three independent signals into one confidence score.
///
/// Starts from `verifier_score`, blends in the critic score if present,
/// then the agreement rate if present, and clamps to [0, 1]. The blend
/// order (critic before agreement) is a fixed policy choice: reordering
/// would change historical scores, so it must be preserved exactly.
pub fn calibrate(
    verifier_score: f64,
    critic_score: Option<f64>,
    agreement_rate: Option<f64>,
) -> f64 {
    let mut score = verifier_score;

    if let Some(critic) = critic_score {
        score = CRITIC_BASE_WEIGHT * score + CRITIC_WEIGHT * critic;
    }

    if let Some(agreement) = agreement_rate {
        score = AGREEMENT_BASE_WEIGHT * score + AGREEMENT_WEIGHT * agreement;
    }

    score.clamp(0.0, 1.0)
}
