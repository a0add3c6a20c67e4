use crate::Context;
use crate::backends;
use crate::config::AppConfig;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use enactor::{ExecutionPlan, InstructionKind, PlanBuilder};
use std::path::Path;

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let app = AppConfig::load()?;
    let registry = backends::registry()?;
    let infra = super::load_infrastructure(file, &app, &registry)?;
    let plan = PlanBuilder::new(&registry).build(&infra)?;

    print_waves(&plan, ctx.verbose > 0);
    println!();
    ui::info(&summary(&plan));
    Ok(())
}

/// Print instructions grouped by wave; `deps` adds each instruction's
/// dependencies
pub fn print_waves(plan: &ExecutionPlan, deps: bool) {
    let waves = plan.waves();
    ui::header(&format!("Plan for {}", plan.infra_name()));
    for (n, wave) in waves.iter().enumerate() {
        ui::section(&format!("Wave {} ({} instruction(s))", n + 1, wave.len()));
        for id in wave {
            let Some(instr) = plan.instruction(*id) else {
                continue;
            };
            println!("  {} {}", format!("{id}").dimmed(), instr.describe());
            if deps && !instr.depends_on.is_empty() {
                let after: Vec<String> = instr.depends_on.iter().map(ToString::to_string).collect();
                ui::dim(&format!("  after {}", after.join(", ")));
            }
        }
    }
}

pub fn summary(plan: &ExecutionPlan) -> String {
    let counts: Vec<String> = [
        InstructionKind::Create,
        InstructionKind::Configure,
        InstructionKind::HealthCheck,
        InstructionKind::Delete,
    ]
    .into_iter()
    .map(|kind| (kind, plan.count(kind)))
    .filter(|(_, n)| *n > 0)
    .map(|(kind, n)| format!("{n} {kind}"))
    .collect();
    format!(
        "{} instruction(s) in {} wave(s): {}",
        plan.len(),
        plan.waves().len(),
        counts.join(", ")
    )
}
