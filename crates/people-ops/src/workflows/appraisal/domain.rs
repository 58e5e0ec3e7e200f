use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for portal users (employees, evaluators, approvers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for evaluation records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationId(pub String);

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for rated criteria.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CriterionId(pub String);

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-year slot of an evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CycleHalf {
    H1,
    H2,
}

/// Recurring period for which one evaluation per employee is generated.
///
/// Canonical text form is `YYYY-H1` / `YYYY-H2`, accepted case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CyclePeriod {
    pub year: i32,
    pub half: CycleHalf,
}

impl CyclePeriod {
    pub const fn new(year: i32, half: CycleHalf) -> Self {
        Self { year, half }
    }
}

impl fmt::Display for CyclePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let half = match self.half {
            CycleHalf::H1 => "H1",
            CycleHalf::H2 => "H2",
        };
        write!(f, "{}-{}", self.year, half)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid cycle period (expected YYYY-H1 or YYYY-H2)")]
pub struct PeriodParseError(pub String);

impl FromStr for CyclePeriod {
    type Err = PeriodParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (year, half) = trimmed
            .split_once('-')
            .ok_or_else(|| PeriodParseError(raw.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| PeriodParseError(raw.to_string()))?;
        let half = match half.to_ascii_uppercase().as_str() {
            "H1" => CycleHalf::H1,
            "H2" => CycleHalf::H2,
            _ => return Err(PeriodParseError(raw.to_string())),
        };
        Ok(CyclePeriod { year, half })
    }
}

impl Serialize for CyclePeriod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CyclePeriod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle states of a single evaluation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationStatus {
    Draft,
    InProgress,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
}

impl EvaluationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EvaluationStatus::Draft => "draft",
            EvaluationStatus::InProgress => "in_progress",
            EvaluationStatus::AwaitingApproval => "awaiting_approval",
            EvaluationStatus::Approved => "approved",
            EvaluationStatus::Rejected => "rejected",
            EvaluationStatus::Completed => "completed",
        }
    }

    /// Score entries may only change while the record sits in one of these states.
    pub const fn is_editable(self) -> bool {
        matches!(
            self,
            EvaluationStatus::Draft | EvaluationStatus::InProgress | EvaluationStatus::Rejected
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, EvaluationStatus::Completed)
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Employee facts captured when the evaluation is created.
///
/// Snapshotted so roster edits after cycle generation never change what an
/// in-flight evaluation is measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub id: UserId,
    pub display_name: String,
    /// Leaders answer the leadership criteria in addition to the base rubric.
    pub leader: bool,
}

/// Upper bound for a single criterion rating.
pub const MAX_RATING: u8 = 5;

/// One rating given by the evaluator for one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub criterion_id: CriterionId,
    pub rating: u8,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// How the final score was aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Unweighted,
    Weighted,
}

impl ScoringMode {
    pub const fn label(self) -> &'static str {
        match self {
            ScoringMode::Unweighted => "unweighted",
            ScoringMode::Weighted => "weighted",
        }
    }
}

/// Persisted scoring outcome. The mode travels with the value so historical
/// scores stay interpretable after the weighting flag changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub value: f64,
    pub mode: ScoringMode,
    /// Set when weighted mode was requested but the weight table was unusable
    /// and the engine fell back to the unweighted mean.
    pub degraded: bool,
}

/// Append-only record of who moved the evaluation and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: String,
    pub at: DateTime<Utc>,
}

/// One evaluation instance for one employee in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub employee: EmployeeSnapshot,
    /// Assignment snapshot taken at creation; later mapping changes do not apply.
    pub evaluator: UserId,
    /// Reviewer of the evaluator's submission, snapshotted alongside the evaluator.
    pub approver: UserId,
    pub period: CyclePeriod,
    pub status: EvaluationStatus,
    pub entries: BTreeMap<CriterionId, ScoreEntry>,
    pub rejection_reason: Option<String>,
    pub final_score: Option<FinalScore>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub audit: Vec<AuditEntry>,
}

impl Evaluation {
    pub fn new(
        id: EvaluationId,
        employee: EmployeeSnapshot,
        evaluator: UserId,
        approver: UserId,
        period: CyclePeriod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employee,
            evaluator,
            approver,
            period,
            status: EvaluationStatus::Draft,
            entries: BTreeMap::new(),
            rejection_reason: None,
            final_score: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            audit: Vec::new(),
        }
    }

    pub fn record_action(&mut self, actor: &UserId, action: &str, at: DateTime<Utc>) {
        self.audit.push(AuditEntry {
            actor: actor.clone(),
            action: action.to_string(),
            at,
        });
    }

    pub fn status_view(&self) -> EvaluationView {
        EvaluationView {
            id: self.id.clone(),
            employee_id: self.employee.id.clone(),
            evaluator_id: self.evaluator.clone(),
            period: self.period,
            status: self.status.label(),
            entries: self
                .entries
                .values()
                .map(|entry| ScoreEntryView {
                    criterion_id: entry.criterion_id.clone(),
                    rating: entry.rating,
                    comment: entry.comment.clone(),
                })
                .collect(),
            rejection_reason: self.rejection_reason.clone(),
            final_score: self.final_score,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
        }
    }
}

/// Sanitized representation of an evaluation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub id: EvaluationId,
    pub employee_id: UserId,
    pub evaluator_id: UserId,
    pub period: CyclePeriod,
    pub status: &'static str,
    pub entries: Vec<ScoreEntryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<FinalScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreEntryView {
    pub criterion_id: CriterionId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Capability roles recognized by the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Evaluator,
    Approver,
    Scheduler,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Role::Employee),
            "evaluator" => Some(Role::Evaluator),
            "approver" => Some(Role::Approver),
            "scheduler" => Some(Role::Scheduler),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Evaluator => "evaluator",
            Role::Approver => "approver",
            Role::Scheduler => "scheduler",
            Role::Admin => "admin",
        }
    }
}

/// The acting identity attached to every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }
}

/// Workflow operations subject to the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    SaveEntry,
    Submit,
    Approve,
    Reject,
    RunCycle,
}

impl WorkflowAction {
    pub const fn label(self) -> &'static str {
        match self {
            WorkflowAction::SaveEntry => "save_entry",
            WorkflowAction::Submit => "submit",
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::RunCycle => "run_cycle",
        }
    }
}

/// Capability check consulted before any state mutation. Supplied by the
/// surrounding portal; a denial must prevent the mutation entirely.
pub trait AuthorizationGate: Send + Sync {
    fn authorize(&self, principal: &Principal, action: WorkflowAction) -> Result<(), GateDenial>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{principal} ({role}) may not {action}")]
pub struct GateDenial {
    pub principal: UserId,
    pub role: &'static str,
    pub action: &'static str,
}

/// Default role-capability matrix used by the portal deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleCapabilityGate;

impl AuthorizationGate for RoleCapabilityGate {
    fn authorize(&self, principal: &Principal, action: WorkflowAction) -> Result<(), GateDenial> {
        let allowed = match action {
            WorkflowAction::SaveEntry | WorkflowAction::Submit => {
                matches!(principal.role, Role::Evaluator | Role::Admin)
            }
            WorkflowAction::Approve | WorkflowAction::Reject => {
                matches!(principal.role, Role::Approver | Role::Admin)
            }
            WorkflowAction::RunCycle => {
                matches!(principal.role, Role::Scheduler | Role::Admin)
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(GateDenial {
                principal: principal.id.clone(),
                role: principal.role.label(),
                action: action.label(),
            })
        }
    }
}
