//! Performance evaluation workflow engine.
//!
//! The scheduler generates one evaluation per active employee and cycle,
//! snapshotting the resolved evaluator. The service then drives each record
//! through the approval state machine, computing the final score on approval
//! and emitting best-effort notifications on the transitions that need them.

pub mod assignment;
pub mod domain;
pub mod notify;
pub mod repository;
pub mod router;
pub mod scheduler;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use assignment::{AssignmentResolver, ResolveError};
pub use domain::{
    AuditEntry, AuthorizationGate, CriterionId, CycleHalf, CyclePeriod, EmployeeSnapshot,
    Evaluation, EvaluationId, EvaluationStatus, EvaluationView, FinalScore, GateDenial, Principal,
    Role, RoleCapabilityGate, ScoreEntry, ScoreEntryView, ScoringMode, UserId, WorkflowAction,
    MAX_RATING,
};
pub use notify::{
    EvaluationEvent, NotificationDispatcher, PushChannel, PushError, PushNotification,
};
pub use repository::{
    AssignmentDirectory, DirectoryError, EmployeeRoster, EvaluationRepository, EvaluatorMapping,
    RepositoryError,
};
pub use router::{appraisal_router, AppraisalState};
pub use scheduler::{CycleError, CycleRunSummary, CycleScheduler, SkipReason, SkippedEmployee};
pub use scoring::{
    Criterion, CriterionCatalog, EnvWeightingToggle, FixedToggle, ScoringEngine, StandardCatalog,
    WeightingToggle, WEIGHTED_SCORING_VAR,
};
pub use service::{AppraisalService, CycleReport, SaveEntryRequest, WorkflowError};
