use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    AuthorizationGate, CriterionId, CyclePeriod, Evaluation, EvaluationId, EvaluationStatus,
    GateDenial, Principal, ScoreEntry, UserId, WorkflowAction, MAX_RATING,
};
use super::notify::{EvaluationEvent, NotificationDispatcher, PushChannel};
use super::repository::{EvaluationRepository, RepositoryError};
use super::scoring::{CriterionCatalog, ScoringEngine};

/// Drives a single evaluation through its lifecycle: entry edits, submission,
/// approval or rejection, and final score computation.
///
/// Every mutating operation consults the authorization gate first and applies
/// its write through a status compare-and-swap, so two concurrent actions on
/// the same record cannot both pass the same guard.
pub struct AppraisalService<R, P> {
    repository: Arc<R>,
    dispatcher: NotificationDispatcher<P>,
    gate: Arc<dyn AuthorizationGate>,
    catalog: Arc<dyn CriterionCatalog>,
    engine: ScoringEngine,
}

/// Inbound payload for a single rating.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveEntryRequest {
    pub criterion_id: CriterionId,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

impl<R, P> AppraisalService<R, P>
where
    R: EvaluationRepository + 'static,
    P: PushChannel + 'static,
{
    pub fn new(
        repository: Arc<R>,
        channel: Arc<P>,
        gate: Arc<dyn AuthorizationGate>,
        catalog: Arc<dyn CriterionCatalog>,
        engine: ScoringEngine,
    ) -> Self {
        Self {
            repository,
            dispatcher: NotificationDispatcher::new(channel),
            gate,
            catalog,
            engine,
        }
    }

    /// Record or replace one criterion rating. The first entry saved on a
    /// `draft` or `rejected` record moves it to `in_progress`.
    pub fn save_entry(
        &self,
        principal: &Principal,
        id: &EvaluationId,
        request: SaveEntryRequest,
    ) -> Result<Evaluation, WorkflowError> {
        self.gate.authorize(principal, WorkflowAction::SaveEntry)?;

        if request.rating > MAX_RATING {
            return Err(WorkflowError::RatingOutOfRange {
                rating: request.rating,
                max: MAX_RATING,
            });
        }

        let mut evaluation = self.load(id)?;
        self.ensure_open(&evaluation)?;
        self.ensure_evaluator(principal, &evaluation)?;

        if !evaluation.status.is_editable() {
            return Err(WorkflowError::EntriesLocked {
                id: evaluation.id.clone(),
                status: evaluation.status,
            });
        }

        let prior_status = evaluation.status;
        let now = Utc::now();
        evaluation.entries.insert(
            request.criterion_id.clone(),
            ScoreEntry {
                criterion_id: request.criterion_id,
                rating: request.rating,
                comment: request.comment,
                recorded_at: now,
            },
        );
        if matches!(
            prior_status,
            EvaluationStatus::Draft | EvaluationStatus::Rejected
        ) {
            evaluation.status = EvaluationStatus::InProgress;
        }
        evaluation.updated_at = now;
        evaluation.record_action(&principal.id, "save_entry", now);

        self.apply(evaluation.clone(), prior_status)?;
        Ok(evaluation)
    }

    /// Submit a fully rated evaluation for approval.
    pub fn submit(
        &self,
        principal: &Principal,
        id: &EvaluationId,
    ) -> Result<Evaluation, WorkflowError> {
        self.gate.authorize(principal, WorkflowAction::Submit)?;

        let mut evaluation = self.load(id)?;
        self.ensure_open(&evaluation)?;
        self.ensure_evaluator(principal, &evaluation)?;

        let prior_status = evaluation.status;
        if !prior_status.is_editable() {
            return Err(WorkflowError::StaleState {
                id: evaluation.id.clone(),
                expected: EvaluationStatus::InProgress,
                actual: prior_status,
            });
        }

        let missing = self.missing_criteria(&evaluation);
        if !missing.is_empty() {
            return Err(WorkflowError::IncompleteEvaluation {
                id: evaluation.id.clone(),
                missing,
            });
        }

        let now = Utc::now();
        evaluation.status = EvaluationStatus::AwaitingApproval;
        evaluation.submitted_at = Some(now);
        evaluation.updated_at = now;
        evaluation.record_action(&principal.id, "submit", now);

        self.apply(evaluation.clone(), prior_status)?;

        let approver = evaluation.approver.clone();
        self.dispatcher
            .notify(&approver, &evaluation, EvaluationEvent::AwaitingApproval);

        Ok(evaluation)
    }

    /// Approve a submitted evaluation. Computes and persists the final score
    /// synchronously, then closes the record as `completed`.
    pub fn approve(
        &self,
        principal: &Principal,
        id: &EvaluationId,
    ) -> Result<Evaluation, WorkflowError> {
        self.gate.authorize(principal, WorkflowAction::Approve)?;

        let mut evaluation = self.load(id)?;
        self.ensure_open(&evaluation)?;
        self.ensure_approver(principal, &evaluation)?;
        self.ensure_awaiting(&evaluation)?;

        let now = Utc::now();
        evaluation.status = EvaluationStatus::Approved;
        evaluation.approved_at = Some(now);
        evaluation.updated_at = now;
        evaluation.record_action(&principal.id, "approve", now);

        // Losing one of two concurrent approvals surfaces here as StaleState.
        self.apply(evaluation.clone(), EvaluationStatus::AwaitingApproval)?;

        let criteria = self.catalog.applicable(evaluation.employee.leader);
        let score = self.engine.compute(&evaluation, &criteria);

        evaluation.final_score = Some(score);
        evaluation.status = EvaluationStatus::Completed;
        evaluation.updated_at = Utc::now();
        evaluation.record_action(&principal.id, "complete", evaluation.updated_at);

        self.apply(evaluation.clone(), EvaluationStatus::Approved)?;

        info!(
            evaluation = %evaluation.id,
            period = %evaluation.period,
            score = score.value,
            mode = score.mode.label(),
            degraded = score.degraded,
            "evaluation completed"
        );

        let evaluator = evaluation.evaluator.clone();
        let employee = evaluation.employee.id.clone();
        self.dispatcher
            .notify(&evaluator, &evaluation, EvaluationEvent::Approved);
        self.dispatcher
            .notify(&employee, &evaluation, EvaluationEvent::Completed);

        Ok(evaluation)
    }

    /// Return a submitted evaluation to the evaluator for revision. Clears no
    /// data; prior entries stay editable.
    pub fn reject(
        &self,
        principal: &Principal,
        id: &EvaluationId,
        reason: &str,
    ) -> Result<Evaluation, WorkflowError> {
        self.gate.authorize(principal, WorkflowAction::Reject)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::RejectionReasonRequired(id.clone()));
        }

        let mut evaluation = self.load(id)?;
        self.ensure_open(&evaluation)?;
        self.ensure_approver(principal, &evaluation)?;
        self.ensure_awaiting(&evaluation)?;

        let now = Utc::now();
        evaluation.status = EvaluationStatus::Rejected;
        evaluation.rejection_reason = Some(reason.to_string());
        evaluation.updated_at = now;
        evaluation.record_action(&principal.id, "reject", now);

        self.apply(evaluation.clone(), EvaluationStatus::AwaitingApproval)?;

        let evaluator = evaluation.evaluator.clone();
        self.dispatcher
            .notify(&evaluator, &evaluation, EvaluationEvent::Rejected);

        Ok(evaluation)
    }

    /// Fetch an evaluation for API responses.
    pub fn get(&self, id: &EvaluationId) -> Result<Evaluation, WorkflowError> {
        self.load(id)
    }

    /// Aggregate view over one cycle, for the portal's reporting page.
    pub fn cycle_report(&self, period: CyclePeriod) -> Result<CycleReport, WorkflowError> {
        let evaluations = self.repository.list_by_period(period)?;

        let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut completed_scores = Vec::new();
        for evaluation in &evaluations {
            *by_status.entry(evaluation.status.label()).or_default() += 1;
            if let Some(score) = evaluation.final_score {
                completed_scores.push(score.value);
            }
        }

        let average_final_score = if completed_scores.is_empty() {
            None
        } else {
            let mean = completed_scores.iter().sum::<f64>() / completed_scores.len() as f64;
            Some((mean * 100.0).round() / 100.0)
        };

        Ok(CycleReport {
            period,
            total: evaluations.len(),
            by_status: by_status
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
            average_final_score,
        })
    }

    fn load(&self, id: &EvaluationId) -> Result<Evaluation, WorkflowError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| WorkflowError::NotFound(id.clone()))
    }

    fn apply(
        &self,
        evaluation: Evaluation,
        expected: EvaluationStatus,
    ) -> Result<(), WorkflowError> {
        let id = evaluation.id.clone();
        match self.repository.update_where_status(evaluation, expected) {
            Ok(()) => Ok(()),
            Err(RepositoryError::Stale) => {
                let actual = self
                    .repository
                    .fetch(&id)?
                    .map(|current| current.status)
                    .unwrap_or(expected);
                Err(WorkflowError::StaleState {
                    id,
                    expected,
                    actual,
                })
            }
            Err(RepositoryError::NotFound) => Err(WorkflowError::NotFound(id)),
            Err(other) => Err(WorkflowError::Repository(other)),
        }
    }

    fn ensure_open(&self, evaluation: &Evaluation) -> Result<(), WorkflowError> {
        if evaluation.status.is_terminal() {
            return Err(WorkflowError::EvaluationClosed(evaluation.id.clone()));
        }
        Ok(())
    }

    fn ensure_awaiting(&self, evaluation: &Evaluation) -> Result<(), WorkflowError> {
        if evaluation.status != EvaluationStatus::AwaitingApproval {
            return Err(WorkflowError::StaleState {
                id: evaluation.id.clone(),
                expected: EvaluationStatus::AwaitingApproval,
                actual: evaluation.status,
            });
        }
        Ok(())
    }

    fn ensure_evaluator(
        &self,
        principal: &Principal,
        evaluation: &Evaluation,
    ) -> Result<(), WorkflowError> {
        if principal.id != evaluation.evaluator {
            return Err(WorkflowError::NotAssigned {
                id: evaluation.id.clone(),
                principal: principal.id.clone(),
            });
        }
        Ok(())
    }

    fn ensure_approver(
        &self,
        principal: &Principal,
        evaluation: &Evaluation,
    ) -> Result<(), WorkflowError> {
        if principal.id != evaluation.approver {
            return Err(WorkflowError::NotAssigned {
                id: evaluation.id.clone(),
                principal: principal.id.clone(),
            });
        }
        Ok(())
    }

    fn missing_criteria(&self, evaluation: &Evaluation) -> Vec<CriterionId> {
        self.catalog
            .applicable(evaluation.employee.leader)
            .into_iter()
            .map(|criterion| criterion.id)
            .filter(|id| !evaluation.entries.contains_key(id))
            .collect()
    }
}

/// Aggregate counts and average score for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub period: CyclePeriod,
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_final_score: Option<f64>,
}

/// Error raised by evaluation lifecycle operations. Every variant carries the
/// affected identifier so callers can decide between retry and user-facing
/// display; none is process-fatal.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("evaluation {0} not found")]
    NotFound(EvaluationId),
    #[error("evaluation {id} is missing ratings for: {}", join_ids(.missing))]
    IncompleteEvaluation {
        id: EvaluationId,
        missing: Vec<CriterionId>,
    },
    #[error("evaluation {id} changed concurrently (expected {expected}, found {actual})")]
    StaleState {
        id: EvaluationId,
        expected: EvaluationStatus,
        actual: EvaluationStatus,
    },
    #[error("evaluation {0} is completed and closed to further changes")]
    EvaluationClosed(EvaluationId),
    #[error("entries on evaluation {id} are locked while {status}")]
    EntriesLocked {
        id: EvaluationId,
        status: EvaluationStatus,
    },
    #[error("rating {rating} is outside the allowed range 0..={max}")]
    RatingOutOfRange { rating: u8, max: u8 },
    #[error("a rejection reason is required for evaluation {0}")]
    RejectionReasonRequired(EvaluationId),
    #[error("{principal} is not the assigned party for evaluation {id}")]
    NotAssigned { id: EvaluationId, principal: UserId },
    #[error(transparent)]
    Unauthorized(#[from] GateDenial),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn join_ids(ids: &[CriterionId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
