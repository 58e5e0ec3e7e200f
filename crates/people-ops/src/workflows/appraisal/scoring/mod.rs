mod catalog;
mod flag;

pub use catalog::{Criterion, CriterionCatalog, StandardCatalog};
pub use flag::{EnvWeightingToggle, FixedToggle, WeightingToggle, WEIGHTED_SCORING_VAR};

use std::sync::Arc;

use tracing::warn;

use super::domain::{Evaluation, FinalScore, ScoringMode};

/// Combines per-criterion ratings into the final score.
///
/// Invoked only from the approve transition, so it always sees the frozen
/// entry set of a fully submitted evaluation. The weighting toggle is
/// consulted on every call.
pub struct ScoringEngine {
    toggle: Arc<dyn WeightingToggle>,
}

impl ScoringEngine {
    pub fn new(toggle: Arc<dyn WeightingToggle>) -> Self {
        Self { toggle }
    }

    pub fn compute(&self, evaluation: &Evaluation, criteria: &[Criterion]) -> FinalScore {
        if self.toggle.weighted_enabled() {
            self.compute_weighted(evaluation, criteria)
        } else {
            FinalScore {
                value: round2(unweighted_mean(evaluation)),
                mode: ScoringMode::Unweighted,
                degraded: false,
            }
        }
    }

    fn compute_weighted(&self, evaluation: &Evaluation, criteria: &[Criterion]) -> FinalScore {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;

        // Only criteria actually rated in this evaluation contribute to the
        // denominator, so an absent criterion cannot skew the result.
        for entry in evaluation.entries.values() {
            let weight = criteria
                .iter()
                .find(|criterion| criterion.id == entry.criterion_id)
                .and_then(|criterion| criterion.weight)
                .unwrap_or(0.0);
            weighted_sum += f64::from(entry.rating) * weight;
            weight_sum += weight;
        }

        if weight_sum <= f64::EPSILON {
            warn!(
                evaluation = %evaluation.id,
                period = %evaluation.period,
                "degraded scoring: weight sum is zero, falling back to unweighted mean"
            );
            return FinalScore {
                value: round2(unweighted_mean(evaluation)),
                mode: ScoringMode::Unweighted,
                degraded: true,
            };
        }

        FinalScore {
            value: round2(weighted_sum / weight_sum),
            mode: ScoringMode::Weighted,
            degraded: false,
        }
    }
}

fn unweighted_mean(evaluation: &Evaluation) -> f64 {
    if evaluation.entries.is_empty() {
        return 0.0;
    }
    let total: f64 = evaluation
        .entries
        .values()
        .map(|entry| f64::from(entry.rating))
        .sum();
    total / evaluation.entries.len() as f64
}

/// Scores stay unrounded internally; only the persisted value is clamped to
/// two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
