use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};

use crate::workflows::appraisal::assignment::AssignmentResolver;
use crate::workflows::appraisal::domain::{
    CycleHalf, CyclePeriod, EmployeeSnapshot, Evaluation, EvaluationId, EvaluationStatus,
    Principal, Role, RoleCapabilityGate, UserId,
};
use crate::workflows::appraisal::notify::{PushChannel, PushError, PushNotification};
use crate::workflows::appraisal::repository::{
    AssignmentDirectory, DirectoryError, EmployeeRoster, EvaluationRepository, EvaluatorMapping,
    RepositoryError,
};
use crate::workflows::appraisal::scheduler::CycleScheduler;
use crate::workflows::appraisal::scoring::{
    Criterion, FixedToggle, ScoringEngine, StandardCatalog,
};
use crate::workflows::appraisal::service::{AppraisalService, SaveEntryRequest};
use crate::workflows::appraisal::CriterionId;

pub(super) fn period() -> CyclePeriod {
    CyclePeriod::new(2025, CycleHalf::H1)
}

pub(super) fn employee(id: &str, name: &str, leader: bool) -> EmployeeSnapshot {
    EmployeeSnapshot {
        id: UserId(id.to_string()),
        display_name: name.to_string(),
        leader,
    }
}

pub(super) fn evaluator_principal() -> Principal {
    Principal::new("diego", Role::Evaluator)
}

pub(super) fn approver_principal() -> Principal {
    Principal::new("elena", Role::Approver)
}

pub(super) fn scheduler_principal() -> Principal {
    Principal::new("cron", Role::Scheduler)
}

/// Small deterministic rubric used by most workflow tests.
pub(super) fn rubric(weights: &[(&str, Option<f64>)]) -> Arc<StandardCatalog> {
    let criteria = weights
        .iter()
        .map(|(id, weight)| Criterion {
            id: CriterionId(id.to_string()),
            name: id.to_string(),
            category: "Test".to_string(),
            weight: *weight,
            leaders_only: false,
        })
        .collect();
    Arc::new(StandardCatalog::new(criteria))
}

pub(super) fn default_rubric() -> Arc<StandardCatalog> {
    rubric(&[("quality", Some(2.0)), ("speed", Some(1.0))])
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    pub(super) records: Mutex<HashMap<EvaluationId, Evaluation>>,
}

impl EvaluationRepository for MemoryRepository {
    fn create(&self, evaluation: Evaluation) -> Result<Evaluation, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let duplicate = guard.values().any(|existing| {
            existing.employee.id == evaluation.employee.id && existing.period == evaluation.period
        });
        if duplicate || guard.contains_key(&evaluation.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(evaluation.id.clone(), evaluation.clone());
        Ok(evaluation)
    }

    fn fetch(&self, id: &EvaluationId) -> Result<Option<Evaluation>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_where_status(
        &self,
        evaluation: Evaluation,
        expected: EvaluationStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let current = guard
            .get(&evaluation.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.status != expected {
            return Err(RepositoryError::Stale);
        }
        guard.insert(evaluation.id.clone(), evaluation);
        Ok(())
    }

    fn list_by_period(&self, period: CyclePeriod) -> Result<Vec<Evaluation>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|evaluation| evaluation.period == period)
            .cloned()
            .collect())
    }
}

pub(super) struct StaticRoster {
    employees: Vec<EmployeeSnapshot>,
}

impl StaticRoster {
    pub(super) fn new(employees: Vec<EmployeeSnapshot>) -> Self {
        Self { employees }
    }
}

impl EmployeeRoster for StaticRoster {
    fn active_employees(&self) -> Result<Vec<EmployeeSnapshot>, DirectoryError> {
        Ok(self.employees.clone())
    }
}

#[derive(Default)]
pub(super) struct StaticDirectory {
    mappings: HashMap<UserId, Vec<EvaluatorMapping>>,
}

impl StaticDirectory {
    pub(super) fn with(mut self, employee: &str, mapping: EvaluatorMapping) -> Self {
        self.mappings
            .entry(UserId(employee.to_string()))
            .or_default()
            .push(mapping);
        self
    }
}

impl AssignmentDirectory for StaticDirectory {
    fn mappings_for(&self, employee: &UserId) -> Result<Vec<EvaluatorMapping>, DirectoryError> {
        Ok(self.mappings.get(employee).cloned().unwrap_or_default())
    }
}

pub(super) fn mapping(evaluator: &str, day: u32) -> EvaluatorMapping {
    EvaluatorMapping {
        evaluator: UserId(evaluator.to_string()),
        established_at: Utc
            .with_ymd_and_hms(2024, 6, day, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
        period_override: None,
        active: true,
    }
}

#[derive(Default)]
pub(super) struct RecordingChannel {
    notifications: Mutex<Vec<PushNotification>>,
}

impl RecordingChannel {
    pub(super) fn sent(&self) -> Vec<PushNotification> {
        self.notifications
            .lock()
            .expect("channel mutex poisoned")
            .clone()
    }
}

impl PushChannel for RecordingChannel {
    fn deliver(&self, notification: PushNotification) -> Result<(), PushError> {
        self.notifications
            .lock()
            .expect("channel mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Channel whose transport always fails, for the fire-and-forget contract.
pub(super) struct DeadChannel;

impl PushChannel for DeadChannel {
    fn deliver(&self, _notification: PushNotification) -> Result<(), PushError> {
        Err(PushError::Transport("push gateway offline".to_string()))
    }
}

pub(super) struct Stack {
    pub(super) service: Arc<AppraisalService<MemoryRepository, RecordingChannel>>,
    pub(super) scheduler: Arc<CycleScheduler<MemoryRepository, RecordingChannel>>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) channel: Arc<RecordingChannel>,
}

/// Standard fixture: alice and bruno report to diego, diego reports to elena,
/// carla has no evaluator at all.
pub(super) fn directory() -> StaticDirectory {
    StaticDirectory::default()
        .with("alice", mapping("diego", 1))
        .with("bruno", mapping("diego", 1))
        .with("diego", mapping("elena", 1))
}

pub(super) fn roster() -> StaticRoster {
    StaticRoster::new(vec![
        employee("alice", "Alice Ramos", false),
        employee("bruno", "Bruno Costa", false),
        employee("carla", "Carla Dias", false),
    ])
}

pub(super) fn build_stack(catalog: Arc<StandardCatalog>, weighted: bool) -> Stack {
    build_stack_with(catalog, weighted, roster(), directory())
}

pub(super) fn build_stack_with(
    catalog: Arc<StandardCatalog>,
    weighted: bool,
    roster: StaticRoster,
    directory: StaticDirectory,
) -> Stack {
    let repository = Arc::new(MemoryRepository::default());
    let channel = Arc::new(RecordingChannel::default());
    let gate = Arc::new(RoleCapabilityGate);

    let service = Arc::new(AppraisalService::new(
        repository.clone(),
        channel.clone(),
        gate.clone(),
        catalog,
        ScoringEngine::new(Arc::new(FixedToggle(weighted))),
    ));
    let scheduler = Arc::new(CycleScheduler::new(
        repository.clone(),
        Arc::new(roster),
        AssignmentResolver::new(Arc::new(directory)),
        channel.clone(),
        gate,
    ));

    Stack {
        service,
        scheduler,
        repository,
        channel,
    }
}

/// Run cycle generation and return alice's evaluation id.
pub(super) fn seeded_evaluation(stack: &Stack) -> EvaluationId {
    stack
        .scheduler
        .generate(&scheduler_principal(), period())
        .expect("cycle generates");
    evaluation_for(stack, "alice")
}

pub(super) fn evaluation_for(stack: &Stack, employee: &str) -> EvaluationId {
    let guard = stack
        .repository
        .records
        .lock()
        .expect("repository mutex poisoned");
    guard
        .values()
        .find(|evaluation| evaluation.employee.id.0 == employee)
        .map(|evaluation| evaluation.id.clone())
        .expect("evaluation exists for employee")
}

pub(super) fn entry(criterion: &str, rating: u8) -> SaveEntryRequest {
    SaveEntryRequest {
        criterion_id: CriterionId(criterion.to_string()),
        rating,
        comment: None,
    }
}

pub(super) fn router(stack: &Stack) -> axum::Router {
    crate::workflows::appraisal::router::appraisal_router(
        crate::workflows::appraisal::router::AppraisalState {
            service: stack.service.clone(),
            scheduler: stack.scheduler.clone(),
        },
    )
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Rate every criterion of the default rubric and submit.
pub(super) fn rate_and_submit(stack: &Stack, id: &EvaluationId) {
    let evaluator = evaluator_principal();
    stack
        .service
        .save_entry(&evaluator, id, entry("quality", 4))
        .expect("quality entry saves");
    stack
        .service
        .save_entry(&evaluator, id, entry("speed", 5))
        .expect("speed entry saves");
    stack
        .service
        .submit(&evaluator, id)
        .expect("submission passes the guard");
}
