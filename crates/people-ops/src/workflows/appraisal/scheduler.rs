use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::assignment::{AssignmentResolver, ResolveError};
use super::domain::{
    AuthorizationGate, CyclePeriod, EmployeeSnapshot, Evaluation, EvaluationId, GateDenial,
    Principal, UserId, WorkflowAction,
};
use super::notify::{EvaluationEvent, NotificationDispatcher, PushChannel};
use super::repository::{DirectoryError, EmployeeRoster, EvaluationRepository, RepositoryError};

static EVALUATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_evaluation_id() -> EvaluationId {
    let id = EVALUATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EvaluationId(format!("eval-{id:06}"))
}

/// Generates the evaluations for one cycle period.
///
/// Idempotent per employee: the repository's (employee, period) uniqueness
/// makes a rerun, a retried cron trigger, or a resumed interrupted batch skip
/// records that already exist instead of duplicating them. Per-employee
/// failures are recorded and never abort the rest of the batch.
pub struct CycleScheduler<R, P> {
    repository: Arc<R>,
    roster: Arc<dyn EmployeeRoster>,
    resolver: AssignmentResolver,
    dispatcher: NotificationDispatcher<P>,
    gate: Arc<dyn AuthorizationGate>,
}

impl<R, P> CycleScheduler<R, P>
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    pub fn new(
        repository: Arc<R>,
        roster: Arc<dyn EmployeeRoster>,
        resolver: AssignmentResolver,
        channel: Arc<P>,
        gate: Arc<dyn AuthorizationGate>,
    ) -> Self {
        Self {
            repository,
            roster,
            resolver,
            dispatcher: NotificationDispatcher::new(channel),
            gate,
        }
    }

    pub fn generate(
        &self,
        principal: &Principal,
        period: CyclePeriod,
    ) -> Result<CycleRunSummary, CycleError> {
        self.gate.authorize(principal, WorkflowAction::RunCycle)?;

        let employees = self.roster.active_employees()?;
        if employees.is_empty() {
            return Err(CycleError::NoEligibleEmployees(period));
        }

        let mut summary = CycleRunSummary::new(period);
        for employee in employees {
            match self.generate_for(principal, period, &employee) {
                Ok(()) => summary.created += 1,
                Err(reason) => {
                    warn!(
                        employee = %employee.id,
                        period = %period,
                        reason = reason.label(),
                        "employee skipped during cycle generation"
                    );
                    summary.skipped.push(SkippedEmployee {
                        employee_id: employee.id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            period = %period,
            created = summary.created,
            skipped = summary.skipped.len(),
            "cycle generation finished"
        );
        Ok(summary)
    }

    fn generate_for(
        &self,
        principal: &Principal,
        period: CyclePeriod,
        employee: &EmployeeSnapshot,
    ) -> Result<(), SkipReason> {
        let evaluator = match self.resolver.resolve(&employee.id, period) {
            Ok(evaluator) => evaluator,
            Err(ResolveError::NotFound(_)) => return Err(SkipReason::NoEvaluator),
            Err(ResolveError::Directory(err)) => {
                return Err(SkipReason::Storage(err.to_string()))
            }
        };
        let approver = self.resolve_approver(&evaluator, period)?;

        let now = Utc::now();
        let mut evaluation = Evaluation::new(
            next_evaluation_id(),
            employee.clone(),
            evaluator.clone(),
            approver,
            period,
            now,
        );
        evaluation.record_action(&principal.id, "cycle_generated", now);

        let created = match self.repository.create(evaluation) {
            Ok(created) => created,
            Err(RepositoryError::Conflict) => return Err(SkipReason::AlreadyExists),
            Err(other) => return Err(SkipReason::Storage(other.to_string())),
        };

        self.dispatcher
            .notify(&created.employee.id, &created, EvaluationEvent::CycleOpened);
        self.dispatcher
            .notify(&evaluator, &created, EvaluationEvent::CycleOpened);
        Ok(())
    }

    /// The evaluator's own mapping names who reviews their submissions; an
    /// evaluator without one approves their own evaluations.
    fn resolve_approver(
        &self,
        evaluator: &UserId,
        period: CyclePeriod,
    ) -> Result<UserId, SkipReason> {
        match self.resolver.resolve(evaluator, period) {
            Ok(approver) => Ok(approver),
            Err(ResolveError::NotFound(_)) => Ok(evaluator.clone()),
            Err(ResolveError::Directory(err)) => Err(SkipReason::Storage(err.to_string())),
        }
    }
}

/// Outcome of one cycle generation run.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRunSummary {
    pub period: CyclePeriod,
    pub created: u32,
    pub skipped: Vec<SkippedEmployee>,
}

impl CycleRunSummary {
    fn new(period: CyclePeriod) -> Self {
        Self {
            period,
            created: 0,
            skipped: Vec::new(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEmployee {
    pub employee_id: UserId,
    pub reason: SkipReason,
}

/// Why one employee produced no new evaluation. None of these abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SkipReason {
    /// The (employee, period) record already exists; the run is idempotent.
    AlreadyExists,
    /// No active evaluator mapping was found for the employee.
    NoEvaluator,
    /// The mapping directory or the repository failed for this employee.
    Storage(String),
}

impl SkipReason {
    pub const fn label(&self) -> &'static str {
        match self {
            SkipReason::AlreadyExists => "already_exists",
            SkipReason::NoEvaluator => "no_evaluator",
            SkipReason::Storage(_) => "storage_unavailable",
        }
    }
}

/// Failure to start a cycle run at all. Per-employee problems are reported in
/// the summary instead.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("no eligible employees found for cycle {0}")]
    NoEligibleEmployees(CyclePeriod),
    #[error(transparent)]
    Unauthorized(#[from] GateDenial),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
