use crate::Context;
use crate::backends;
use crate::config::AppConfig;
use crate::ui;
use anyhow::Result;
use enactor::{Infrastructure, NodeDefinition};
use std::path::Path;

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let app = AppConfig::load()?;
    let registry = backends::registry()?;
    let infra = super::load_infrastructure(file, &app, &registry)?;

    if !ctx.quiet {
        print_families(&infra);
    }
    ui::success(&format!(
        "{} is valid: {} family(ies), {} node(s)",
        file.display(),
        infra.nodes().len(),
        infra.instances().len()
    ));
    Ok(())
}

fn stages(def: &NodeDefinition) -> String {
    let mut stages = vec![format!("create ({})", def.resolver)];
    if let Some(s) = &def.contextualisation {
        stages.push(format!("contextualisation ({})", s.plugin));
    }
    if let Some(s) = &def.config_management {
        stages.push(format!("config_management ({})", s.plugin));
    }
    if let Some(s) = &def.health_check {
        stages.push(format!("health_check ({})", s.plugin));
    }
    stages.join(" → ")
}

fn print_families(infra: &Infrastructure) {
    ui::header(&format!("Infrastructure {}", infra.infra_name()));
    for def in infra.nodes() {
        ui::section(&format!("{} × {}", def.name, def.count));
        ui::kv("stages", &stages(def));
        if !def.depends_on.is_empty() {
            ui::kv("depends on", &def.depends_on.join(", "));
        }
        let names: Vec<&str> = infra
            .instances()
            .iter()
            .filter(|i| i.definition.name == def.name)
            .map(|i| i.name.as_str())
            .collect();
        ui::kv("nodes", &names.join(", "));
    }
    println!();
}
