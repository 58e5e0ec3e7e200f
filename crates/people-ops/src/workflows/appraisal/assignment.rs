use std::sync::Arc;

use super::domain::{CyclePeriod, UserId};
use super::repository::{AssignmentDirectory, DirectoryError, EvaluatorMapping};

/// Resolves which evaluator is responsible for an employee in a given cycle.
///
/// Resolution is deterministic so a rerun of cycle generation reproduces the
/// same assignments: period-specific mappings beat general ones, the most
/// recently established mapping wins within a bucket, and the evaluator id
/// orders mappings established at the same instant.
pub struct AssignmentResolver {
    directory: Arc<dyn AssignmentDirectory>,
}

impl AssignmentResolver {
    pub fn new(directory: Arc<dyn AssignmentDirectory>) -> Self {
        Self { directory }
    }

    pub fn resolve(&self, employee: &UserId, period: CyclePeriod) -> Result<UserId, ResolveError> {
        let mappings = self.directory.mappings_for(employee)?;

        let active: Vec<&EvaluatorMapping> =
            mappings.iter().filter(|mapping| mapping.active).collect();

        let scoped = best_of(active.iter().copied().filter(|mapping| {
            mapping.period_override == Some(period)
        }));
        let general = best_of(
            active
                .iter()
                .copied()
                .filter(|mapping| mapping.period_override.is_none()),
        );

        scoped
            .or(general)
            .map(|mapping| mapping.evaluator.clone())
            .ok_or_else(|| ResolveError::NotFound(employee.clone()))
    }
}

fn best_of<'a>(candidates: impl Iterator<Item = &'a EvaluatorMapping>) -> Option<&'a EvaluatorMapping> {
    candidates.max_by(|a, b| {
        a.established_at
            .cmp(&b.established_at)
            // reversed id order so the max is the lexicographically smaller id
            .then_with(|| b.evaluator.cmp(&a.evaluator))
    })
}

/// A missing mapping is an expected, recoverable condition: the scheduler
/// records it as a skip rather than aborting the batch.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no evaluator mapping for employee {0}")]
    NotFound(UserId),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
