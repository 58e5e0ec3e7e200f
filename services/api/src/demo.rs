use std::sync::Arc;

use clap::Args;

use people_ops::error::AppError;
use people_ops::workflows::appraisal::{
    Criterion, CriterionId, CyclePeriod, EnvWeightingToggle, FixedToggle, Principal, Role,
    SaveEntryRequest, StandardCatalog, WeightingToggle,
};

use crate::infra::{build_portal, default_portal, seed_directory, seed_roster, Portal};

#[derive(Args, Debug)]
pub(crate) struct CycleRunArgs {
    /// Cycle period to generate, e.g. 2025-H1
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: CyclePeriod,
    /// Actor id recorded as the trigger (defaults to the cron identity)
    #[arg(long, default_value = "cron")]
    pub(crate) actor: String,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Cycle period used by the walkthrough, e.g. 2025-H2
    #[arg(long, value_parser = parse_period, default_value = "2025-H2")]
    pub(crate) period: CyclePeriod,
    /// Score with the weighted formula instead of reading the env toggle
    #[arg(long)]
    pub(crate) weighted: bool,
}

fn parse_period(raw: &str) -> Result<CyclePeriod, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

pub(crate) fn run_cycle(args: CycleRunArgs) -> Result<(), AppError> {
    let portal = default_portal();
    let principal = Principal::new(args.actor, Role::Scheduler);

    let summary = portal.scheduler.generate(&principal, args.period)?;

    println!("Cycle {} generated", summary.period);
    println!("- created: {}", summary.created);
    println!("- skipped: {}", summary.skipped_count());
    for skip in &summary.skipped {
        println!("  - {}: {}", skip.employee_id, skip.reason.label());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let period = args.period;
    let portal = demo_portal(args.weighted);

    let cron = Principal::new("cron", Role::Scheduler);
    let evaluator = Principal::new("diego", Role::Evaluator);
    let approver = Principal::new("elena", Role::Approver);

    println!("Performance evaluation workflow demo ({period})");
    if args.weighted {
        println!("Scoring mode: weighted (pinned for the demo)");
    } else {
        println!("Scoring mode: environment toggle (unweighted unless set)");
    }

    let summary = portal.scheduler.generate(&cron, period)?;
    println!("\nCycle generation");
    println!("- created {} evaluation(s)", summary.created);
    for skip in &summary.skipped {
        println!("- skipped {}: {}", skip.employee_id, skip.reason.label());
    }

    let Some(id) = portal.repository.find_for_employee("alice", period) else {
        println!("no evaluation was generated for the walkthrough employee");
        return Ok(());
    };
    println!("\nEvaluator flow for {id}");

    for (criterion, rating, note) in [
        ("quality", 4, Some("consistent delivery")),
        ("speed", 5, None),
    ] {
        let evaluation = portal.service.save_entry(
            &evaluator,
            &id,
            SaveEntryRequest {
                criterion_id: CriterionId(criterion.to_string()),
                rating,
                comment: note.map(str::to_string),
            },
        )?;
        println!(
            "- rated {criterion} at {rating} -> status {}",
            evaluation.status
        );
    }

    portal.service.submit(&evaluator, &id)?;
    println!("- submitted for approval");

    let rejected = portal
        .service
        .reject(&approver, &id, "please justify the speed rating")?;
    println!(
        "- approver returned it: {}",
        rejected.rejection_reason.as_deref().unwrap_or_default()
    );

    portal.service.save_entry(
        &evaluator,
        &id,
        SaveEntryRequest {
            criterion_id: CriterionId("speed".to_string()),
            rating: 5,
            comment: Some("unblocked two releases ahead of schedule".to_string()),
        },
    )?;
    portal.service.submit(&evaluator, &id)?;
    println!("- revised and resubmitted");

    let completed = portal.service.approve(&approver, &id)?;
    match completed.final_score {
        Some(score) => println!(
            "- approved: final score {:.2} ({}{})",
            score.value,
            score.mode.label(),
            if score.degraded { ", degraded" } else { "" }
        ),
        None => println!("- approved, but no score was recorded"),
    }

    let report = portal.service.cycle_report(period)?;
    println!("\nCycle report");
    for (status, count) in &report.by_status {
        println!("- {status}: {count}");
    }
    if let Some(average) = report.average_final_score {
        println!("- average final score: {average:.2}");
    }

    println!("\nDispatched notifications");
    for notification in portal.channel.sent() {
        println!("- to {}: {}", notification.recipient, notification.title);
    }

    Ok(())
}

fn demo_portal(weighted: bool) -> Portal {
    let catalog = Arc::new(StandardCatalog::new(vec![
        Criterion {
            id: CriterionId("quality".to_string()),
            name: "Quality of work".to_string(),
            category: "Performance".to_string(),
            weight: Some(2.0),
            leaders_only: false,
        },
        Criterion {
            id: CriterionId("speed".to_string()),
            name: "Delivery speed".to_string(),
            category: "Performance".to_string(),
            weight: Some(1.0),
            leaders_only: false,
        },
    ]));

    let toggle: Arc<dyn WeightingToggle> = if weighted {
        Arc::new(FixedToggle(true))
    } else {
        Arc::new(EnvWeightingToggle::default())
    };

    build_portal(catalog, toggle, seed_roster(), seed_directory())
}
