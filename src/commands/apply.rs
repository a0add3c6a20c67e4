use crate::Context;
use crate::backends;
use crate::cli::{ApplyArgs, DestroyArgs};
use crate::config::{self, AppConfig, Overrides};
use crate::progress::BarProgress;
use crate::signal;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use enactor::{
    Enactor, EventLog, ExecutionPlan, LogObserver, PlanBuilder, ResolvedNode, RunOutcome,
    RunReport,
};
use std::fs;
use std::path::Path;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let app = AppConfig::load()?;
    let registry = backends::registry()?;
    let infra = super::load_infrastructure(&args.file, &app, &registry)?;
    let plan = PlanBuilder::new(&registry).build(&infra)?;

    let options = app.enact_options(&Overrides {
        jobs: args.jobs,
        timeout_secs: args.timeout,
        rollback_scope: args.rollback_scope.map(Into::into),
    });

    ui::header(&format!("Apply {}", infra.infra_name()));
    ui::kv("nodes", &infra.instances().len().to_string());
    ui::kv("plan", &super::plan::summary(&plan));
    ui::kv("jobs", &options.jobs.to_string());
    ui::kv("rollback scope", &options.rollback_scope.to_string());
    if ctx.verbose > 0 {
        super::plan::print_waves(&plan, true);
    }
    println!();

    if !args.yes && !confirm_proceed()? {
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let report = execute(ctx, Enactor::new(options), plan)?;

    if let Some(path) = &args.save {
        save_nodes(path, &report)?;
    }
    conclude(&report)
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let app = AppConfig::load()?;
    let registry = backends::registry()?;
    let nodes = load_nodes(&args.state)?;
    if nodes.is_empty() {
        ui::info("No nodes to destroy");
        return Ok(());
    }

    let infra = match &args.file {
        Some(file) => Some(super::load_infrastructure(file, &app, &registry)?),
        None => None,
    };
    let infra_name = infra
        .as_ref()
        .map(|i| i.infra_name().to_string())
        .or_else(|| nodes.first().map(|n| n.infra_name.clone()))
        .unwrap_or_default();
    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let plan = PlanBuilder::new(&registry).teardown(&infra_name, nodes, infra.as_ref())?;

    ui::header(&format!("Destroy {infra_name}"));
    ui::kv("nodes", &names.join(", "));
    println!();
    if !args.yes && !confirm_proceed()? {
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let options = app.enact_options(&Overrides {
        jobs: args.jobs,
        ..Default::default()
    });
    let report = execute(ctx, Enactor::new(options), plan)?;
    if report.is_success() {
        fs::remove_file(&args.state)
            .with_context(|| format!("Could not remove {}", args.state.display()))?;
    } else {
        save_nodes(&args.state, &report)?;
    }
    conclude(&report)
}

/// Run a plan with progress, Ctrl-C cancellation and event logging
fn execute(ctx: &Context, enactor: Enactor, plan: ExecutionPlan) -> Result<RunReport> {
    let events = EventLog::new();
    let enactor = enactor
        .with_observer(LogObserver)
        .with_observer(events.clone());
    signal::cancel_on_interrupt(&enactor.cancel_token());

    let mut progress = BarProgress::new(plan.len(), ctx.quiet);
    let result = enactor.run_with_progress(plan, &mut progress);
    progress.finish();

    let report = match result {
        Ok(report) => report,
        Err(enactor::Error::RollbackIncomplete { report, .. }) => *report,
        Err(e) => return Err(e.into()),
    };

    if !ctx.quiet {
        print_events(&events);
    }
    print_report(&report);
    Ok(report)
}

fn print_events(events: &EventLog) {
    let events = events.events();
    if events.is_empty() {
        return;
    }
    ui::section("Events");
    for event in events {
        ui::dim(&event.summary());
    }
}

fn print_report(report: &RunReport) {
    ui::section("Nodes");
    for node in &report.nodes {
        println!(
            "  {} {} {}",
            node.name,
            ui::status_label(node.status()),
            node.primary_address().to_string().dimmed()
        );
    }

    if !report.failures.is_empty() {
        ui::section("Failures");
        for failure in &report.failures {
            ui::error(&format!("{} {}: {}", failure.kind, failure.node_name, failure.error));
        }
    }

    if !report.rollback.is_empty() {
        ui::section("Rollback");
        for step in &report.rollback {
            let line = format!(
                "{} {}: {} ({})",
                step.compensated_kind,
                step.node_name,
                step.action,
                ui::step_status(&step.status)
            );
            if step.status.is_failure() {
                ui::error(&line);
            } else {
                ui::dim(&line);
            }
        }
    }

    println!();
    if report.cancelled {
        ui::warn("Run was interrupted");
    }
    if report.skipped > 0 {
        ui::dim(&format!("{} instruction(s) never ran", report.skipped));
    }
    ui::kv("waves", &report.waves.to_string());
    ui::kv("duration", &ui::format_duration(report.duration()));
}

/// Print the outcome and fail unless the run succeeded
fn conclude(report: &RunReport) -> Result<()> {
    match report.outcome {
        RunOutcome::Succeeded => {
            ui::success(&format!("{} {}", report.infra_name, report.outcome));
            Ok(())
        }
        RunOutcome::RolledBack => bail!("{} {}", report.infra_name, report.outcome),
        RunOutcome::RollbackIncomplete => {
            let live: Vec<&str> = report.live_nodes().map(|n| n.name.as_str()).collect();
            if !live.is_empty() {
                ui::warn(&format!("Nodes still alive: {}", live.join(", ")));
            }
            bail!(
                "{} {}: {} rollback step(s) need attention",
                report.infra_name,
                report.outcome,
                report.rollback_failures().count()
            )
        }
    }
}

/// Write the nodes still alive after a run as JSON
fn save_nodes(path: &Path, report: &RunReport) -> Result<()> {
    let path = config::expand_path(path);
    let live: Vec<&ResolvedNode> = report.live_nodes().collect();
    let json = serde_json::to_string_pretty(&live)?;
    fs::write(&path, json).with_context(|| format!("Could not write {}", path.display()))?;
    ui::info(&format!("Saved {} node(s) to {}", live.len(), path.display()));
    Ok(())
}

fn load_nodes(path: &Path) -> Result<Vec<ResolvedNode>> {
    let path = config::expand_path(path);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid node state in {}", path.display()))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}
