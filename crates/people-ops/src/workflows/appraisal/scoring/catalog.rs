use serde::{Deserialize, Serialize};

use super::super::domain::CriterionId;

/// A named, scorable dimension of the review rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub name: String,
    pub category: String,
    /// Consulted only in weighted mode. A criterion without a configured
    /// weight contributes nothing to the weighted sum.
    pub weight: Option<f64>,
    /// Applies only when the evaluated employee leads people.
    pub leaders_only: bool,
}

/// Source of the rubric configuration. Loaded once per scoring or guard pass;
/// criteria are not owned by any evaluation.
pub trait CriterionCatalog: Send + Sync {
    fn active(&self) -> Vec<Criterion>;

    /// The criteria that bind for a given employee.
    fn applicable(&self, leader: bool) -> Vec<Criterion> {
        self.active()
            .into_iter()
            .filter(|criterion| leader || !criterion.leaders_only)
            .collect()
    }
}

/// Built-in rubric matching the portal's standard review sheet. Deployments
/// with a criteria table configure their own catalog instead.
#[derive(Debug, Clone)]
pub struct StandardCatalog {
    criteria: Vec<Criterion>,
}

impl StandardCatalog {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }
}

impl Default for StandardCatalog {
    fn default() -> Self {
        fn criterion(id: &str, name: &str, category: &str, leaders_only: bool) -> Criterion {
            Criterion {
                id: CriterionId(id.to_string()),
                name: name.to_string(),
                category: category.to_string(),
                weight: None,
                leaders_only,
            }
        }

        Self::new(vec![
            criterion(
                "deadlines-goals",
                "Deadlines and goals",
                "Performance",
                false,
            ),
            criterion("commitment", "Commitment", "Behavior", false),
            criterion(
                "autonomy",
                "Autonomy and proactivity",
                "Behavior",
                false,
            ),
            criterion(
                "communication",
                "Communication and collaboration",
                "Interpersonal",
                false,
            ),
            criterion(
                "domain-knowledge",
                "Knowledge of own activities",
                "Technical",
                false,
            ),
            criterion(
                "problem-solving",
                "Problem solving",
                "Technical",
                false,
            ),
            criterion(
                "composure",
                "Composure and conflict resolution",
                "Interpersonal",
                false,
            ),
            criterion("innovation", "Innovation", "Behavior", false),
            criterion(
                "delegation",
                "Leadership: delegation",
                "Leadership",
                true,
            ),
            criterion(
                "team-development",
                "Leadership: feedback and team development",
                "Leadership",
                true,
            ),
        ])
    }
}

impl CriterionCatalog for StandardCatalog {
    fn active(&self) -> Vec<Criterion> {
        self.criteria.clone()
    }
}
