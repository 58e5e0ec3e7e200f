use std::env;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Utc;

use super::common::{default_rubric, employee, period, rubric};
use crate::workflows::appraisal::domain::{
    CriterionId, Evaluation, EvaluationId, ScoreEntry, ScoringMode, UserId,
};
use crate::workflows::appraisal::scoring::{
    CriterionCatalog, EnvWeightingToggle, FixedToggle, ScoringEngine, WeightingToggle,
};

fn evaluation_with(ratings: &[(&str, u8)]) -> Evaluation {
    let now = Utc::now();
    let mut evaluation = Evaluation::new(
        EvaluationId("eval-test".to_string()),
        employee("alice", "Alice Ramos", false),
        UserId("diego".to_string()),
        UserId("elena".to_string()),
        period(),
        now,
    );
    for (criterion, rating) in ratings {
        evaluation.entries.insert(
            CriterionId(criterion.to_string()),
            ScoreEntry {
                criterion_id: CriterionId(criterion.to_string()),
                rating: *rating,
                comment: None,
                recorded_at: now,
            },
        );
    }
    evaluation
}

#[test]
fn unweighted_mean_rounds_to_two_decimals() {
    let engine = ScoringEngine::new(Arc::new(FixedToggle(false)));
    let rubric = rubric(&[("a", None), ("b", None), ("c", None)]);
    let evaluation = evaluation_with(&[("a", 4), ("b", 5), ("c", 3)]);

    let score = engine.compute(&evaluation, &rubric.active());

    assert_eq!(score.value, 4.00);
    assert_eq!(score.mode, ScoringMode::Unweighted);
    assert!(!score.degraded);
}

#[test]
fn weighted_mode_divides_by_present_weights() {
    let engine = ScoringEngine::new(Arc::new(FixedToggle(true)));
    let rubric = default_rubric();
    let evaluation = evaluation_with(&[("quality", 4), ("speed", 5)]);

    let score = engine.compute(&evaluation, &rubric.active());

    // (4*2 + 5*1) / 3
    assert_eq!(score.value, 4.33);
    assert_eq!(score.mode, ScoringMode::Weighted);
    assert!(!score.degraded);
}

#[test]
fn absent_criteria_do_not_skew_the_denominator() {
    let engine = ScoringEngine::new(Arc::new(FixedToggle(true)));
    let rubric = rubric(&[
        ("quality", Some(2.0)),
        ("speed", Some(1.0)),
        ("teamwork", Some(5.0)),
    ]);
    // teamwork was never rated, so its weight must not dilute the result
    let evaluation = evaluation_with(&[("quality", 4), ("speed", 5)]);

    let score = engine.compute(&evaluation, &rubric.active());

    assert_eq!(score.value, 4.33);
}

#[test]
fn zero_weight_sum_falls_back_to_unweighted() {
    let engine = ScoringEngine::new(Arc::new(FixedToggle(true)));
    let rubric = rubric(&[("quality", Some(0.0)), ("speed", None)]);
    let evaluation = evaluation_with(&[("quality", 4), ("speed", 5)]);

    let score = engine.compute(&evaluation, &rubric.active());

    assert_eq!(score.value, 4.5);
    assert_eq!(score.mode, ScoringMode::Unweighted);
    assert!(score.degraded);
}

fn env_guard() -> &'static Mutex<()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| Mutex::new(()))
}

#[test]
fn env_toggle_is_reread_per_invocation() {
    let _lock = env_guard().lock().expect("env mutex poisoned");
    let var = "APPRAISAL_WEIGHTED_SCORING_TEST";
    env::remove_var(var);

    let toggle = EnvWeightingToggle::new(var);
    assert!(!toggle.weighted_enabled());

    env::set_var(var, "true");
    assert!(toggle.weighted_enabled());

    env::set_var(var, "off");
    assert!(!toggle.weighted_enabled());

    env::remove_var(var);
}

#[test]
fn env_toggle_accepts_common_truthy_spellings() {
    let _lock = env_guard().lock().expect("env mutex poisoned");
    let var = "APPRAISAL_WEIGHTED_SCORING_SPELLINGS";
    let toggle = EnvWeightingToggle::new(var);

    for value in ["1", "true", "YES", "On"] {
        env::set_var(var, value);
        assert!(toggle.weighted_enabled(), "{value} should enable weighting");
    }
    for value in ["0", "false", "whatever", ""] {
        env::set_var(var, value);
        assert!(!toggle.weighted_enabled(), "{value} should not enable weighting");
    }

    env::remove_var(var);
}

#[test]
fn flag_change_between_approvals_changes_recorded_mode() {
    let _lock = env_guard().lock().expect("env mutex poisoned");
    let var = "APPRAISAL_WEIGHTED_SCORING_MODE_SWITCH";
    env::remove_var(var);

    let engine = ScoringEngine::new(Arc::new(EnvWeightingToggle::new(var)));
    let rubric = default_rubric();
    let evaluation = evaluation_with(&[("quality", 4), ("speed", 5)]);

    let first = engine.compute(&evaluation, &rubric.active());
    env::set_var(var, "1");
    let second = engine.compute(&evaluation, &rubric.active());
    env::remove_var(var);

    assert_eq!(first.mode, ScoringMode::Unweighted);
    assert_eq!(second.mode, ScoringMode::Weighted);
}

#[test]
fn leadership_criteria_bind_only_for_leaders() {
    let rubric = crate::workflows::appraisal::scoring::StandardCatalog::default();

    let base = rubric.applicable(false);
    let leader = rubric.applicable(true);

    assert!(base.iter().all(|criterion| !criterion.leaders_only));
    assert!(leader.len() > base.len());
}
