use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use people_ops::workflows::appraisal::{
    AppraisalService, AppraisalState, AssignmentDirectory, AssignmentResolver, CyclePeriod,
    CycleScheduler, DirectoryError, EmployeeRoster, EmployeeSnapshot, EnvWeightingToggle,
    Evaluation, EvaluationId, EvaluationRepository, EvaluationStatus, EvaluatorMapping, PushChannel,
    PushError, PushNotification, RepositoryError, RoleCapabilityGate, ScoringEngine,
    StandardCatalog, UserId, WeightingToggle,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mutex-guarded map standing in for the `evaluations` table. The uniqueness
/// and status-CAS contracts live here, exactly where a SQL backend would put
/// its unique index and conditional UPDATE.
#[derive(Default)]
pub(crate) struct InMemoryEvaluationRepository {
    records: Mutex<HashMap<EvaluationId, Evaluation>>,
}

impl InMemoryEvaluationRepository {
    pub(crate) fn find_for_employee(
        &self,
        employee: &str,
        period: CyclePeriod,
    ) -> Option<EvaluationId> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        guard
            .values()
            .find(|evaluation| {
                evaluation.employee.id.0 == employee && evaluation.period == period
            })
            .map(|evaluation| evaluation.id.clone())
    }
}

impl EvaluationRepository for InMemoryEvaluationRepository {
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

#[derive(Default)]
pub(crate) struct InMemoryRoster {
    employees: Vec<EmployeeSnapshot>,
}

impl InMemoryRoster {
    pub(crate) fn new(employees: Vec<EmployeeSnapshot>) -> Self {
        Self { employees }
    }
}

impl EmployeeRoster for InMemoryRoster {
    fn active_employees(&self) -> Result<Vec<EmployeeSnapshot>, DirectoryError> {
        Ok(self.employees.clone())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAssignmentDirectory {
    mappings: HashMap<UserId, Vec<EvaluatorMapping>>,
}

impl InMemoryAssignmentDirectory {
    pub(crate) fn with(mut self, employee: &str, mapping: EvaluatorMapping) -> Self {
        self.mappings
            .entry(UserId(employee.to_string()))
            .or_default()
            .push(mapping);
        self
    }
}

impl AssignmentDirectory for InMemoryAssignmentDirectory {
    fn mappings_for(&self, employee: &UserId) -> Result<Vec<EvaluatorMapping>, DirectoryError> {
        Ok(self.mappings.get(employee).cloned().unwrap_or_default())
    }
}

/// Stand-in for the browser push gateway: records every payload and logs it.
#[derive(Default)]
pub(crate) struct InMemoryPushChannel {
    notifications: Mutex<Vec<PushNotification>>,
}

impl InMemoryPushChannel {
    pub(crate) fn sent(&self) -> Vec<PushNotification> {
        self.notifications
            .lock()
            .expect("push channel mutex poisoned")
            .clone()
    }
}

impl PushChannel for InMemoryPushChannel {
    fn deliver(&self, notification: PushNotification) -> Result<(), PushError> {
        info!(
            recipient = %notification.recipient,
            title = %notification.title,
            "push notification"
        );
        self.notifications
            .lock()
            .expect("push channel mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) type PortalService =
    AppraisalService<InMemoryEvaluationRepository, InMemoryPushChannel>;
pub(crate) type PortalScheduler =
    CycleScheduler<InMemoryEvaluationRepository, InMemoryPushChannel>;

pub(crate) struct Portal {
    pub(crate) service: Arc<PortalService>,
    pub(crate) scheduler: Arc<PortalScheduler>,
    pub(crate) repository: Arc<InMemoryEvaluationRepository>,
    pub(crate) channel: Arc<InMemoryPushChannel>,
}

impl Portal {
    pub(crate) fn state(&self) -> AppraisalState<InMemoryEvaluationRepository, InMemoryPushChannel>
    {
        AppraisalState {
            service: self.service.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

/// Wire the workflow over in-memory adapters. The served deployment reads the
/// weighting flag from the environment on every scoring pass; demos may pin it.
pub(crate) fn build_portal(
    catalog: Arc<StandardCatalog>,
    toggle: Arc<dyn WeightingToggle>,
    roster: InMemoryRoster,
    directory: InMemoryAssignmentDirectory,
) -> Portal {
    let repository = Arc::new(InMemoryEvaluationRepository::default());
    let channel = Arc::new(InMemoryPushChannel::default());
    let gate = Arc::new(RoleCapabilityGate);

    let service = Arc::new(AppraisalService::new(
        repository.clone(),
        channel.clone(),
        gate.clone(),
        catalog,
        ScoringEngine::new(toggle),
    ));
    let scheduler = Arc::new(CycleScheduler::new(
        repository.clone(),
        Arc::new(roster),
        AssignmentResolver::new(Arc::new(directory)),
        channel.clone(),
        gate,
    ));

    Portal {
        service,
        scheduler,
        repository,
        channel,
    }
}

pub(crate) fn default_portal() -> Portal {
    build_portal(
        Arc::new(StandardCatalog::default()),
        Arc::new(EnvWeightingToggle::default()),
        seed_roster(),
        seed_directory(),
    )
}

fn seed_mapping(evaluator: &str) -> EvaluatorMapping {
    EvaluatorMapping {
        evaluator: UserId(evaluator.to_string()),
        established_at: Utc
            .with_ymd_and_hms(2025, 1, 2, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
        period_override: None,
        active: true,
    }
}

/// Seed data mirroring the HR tables the portal would read in production.
pub(crate) fn seed_roster() -> InMemoryRoster {
    fn employee(id: &str, name: &str, leader: bool) -> EmployeeSnapshot {
        EmployeeSnapshot {
            id: UserId(id.to_string()),
            display_name: name.to_string(),
            leader,
        }
    }

    InMemoryRoster::new(vec![
        employee("alice", "Alice Ramos", false),
        employee("bruno", "Bruno Costa", false),
        employee("carla", "Carla Dias", false),
    ])
}

pub(crate) fn seed_directory() -> InMemoryAssignmentDirectory {
    InMemoryAssignmentDirectory::default()
        .with("alice", seed_mapping("diego"))
        .with("bruno", seed_mapping("diego"))
        .with("diego", seed_mapping("elena"))
    // carla intentionally has no mapping: cycle runs report her as skipped
}
