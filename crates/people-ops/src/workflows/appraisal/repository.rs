use chrono::{DateTime, Utc};

use super::domain::{CyclePeriod, EmployeeSnapshot, Evaluation, EvaluationId, EvaluationStatus, UserId};

/// Storage port for evaluation records.
///
/// Implementations back onto the `evaluations` table keyed by
/// (employee, period). Two contracts matter for correctness under concurrent
/// callers and are exercised by the workflow tests:
///
/// - `create` is an atomic check-and-insert: a second record for the same
///   (employee, period) must fail with [`RepositoryError::Conflict`] even when
///   two scheduler runs race.
/// - `update_where_status` applies the write only while the stored status
///   still equals `expected`; otherwise it fails with
///   [`RepositoryError::Stale`] and writes nothing.
pub trait EvaluationRepository: Send + Sync {
    fn create(&self, evaluation: Evaluation) -> Result<Evaluation, RepositoryError>;
    fn fetch(&self, id: &EvaluationId) -> Result<Option<Evaluation>, RepositoryError>;
    fn update_where_status(
        &self,
        evaluation: Evaluation,
        expected: EvaluationStatus,
    ) -> Result<(), RepositoryError>;
    fn list_by_period(&self, period: CyclePeriod) -> Result<Vec<Evaluation>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an evaluation already exists for this employee and period")]
    Conflict,
    #[error("evaluation not found")]
    NotFound,
    #[error("evaluation status changed since it was read")]
    Stale,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the active employee population.
pub trait EmployeeRoster: Send + Sync {
    fn active_employees(&self) -> Result<Vec<EmployeeSnapshot>, DirectoryError>;
}

/// One row of the external employee-to-evaluator mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorMapping {
    pub evaluator: UserId,
    pub established_at: DateTime<Utc>,
    /// When set, the mapping applies to that cycle only and beats any
    /// general mapping for it.
    pub period_override: Option<CyclePeriod>,
    pub active: bool,
}

/// Read-only port over the employee-manager mapping table. The workflow
/// never writes to it; it snapshots the resolved evaluator at creation.
pub trait AssignmentDirectory: Send + Sync {
    fn mappings_for(&self, employee: &UserId) -> Result<Vec<EvaluatorMapping>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
