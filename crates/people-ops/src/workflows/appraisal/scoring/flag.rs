use std::env;

/// Environment variable controlling weighted scoring.
pub const WEIGHTED_SCORING_VAR: &str = "APPRAISAL_WEIGHTED_SCORING";

/// Source of the weighted-scoring toggle, injected into the engine so the
/// flag never lives in hidden global state.
///
/// The contract is re-read-per-invocation: operators can flip the flag on a
/// running process and only evaluations approved afterwards pick it up.
pub trait WeightingToggle: Send + Sync {
    fn weighted_enabled(&self) -> bool;
}

/// Reads the toggle from the process environment on every call.
/// `1`, `true`, `yes`, and `on` (case-insensitive) enable it; anything else,
/// including an unset variable, leaves weighting off.
#[derive(Debug, Clone)]
pub struct EnvWeightingToggle {
    var: String,
}

impl EnvWeightingToggle {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvWeightingToggle {
    fn default() -> Self {
        Self::new(WEIGHTED_SCORING_VAR)
    }
}

impl WeightingToggle for EnvWeightingToggle {
    fn weighted_enabled(&self) -> bool {
        match env::var(&self.var) {
            Ok(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            Err(_) => false,
        }
    }
}

/// Fixed toggle for tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedToggle(pub bool);

impl WeightingToggle for FixedToggle {
    fn weighted_enabled(&self) -> bool {
        self.0
    }
}
