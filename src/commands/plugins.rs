use crate::Context;
use crate::backends;
use crate::ui;
use anyhow::Result;
use enactor::Schema;

pub fn run(ctx: &Context) -> Result<()> {
    let registry = backends::registry()?;
    ui::header("Registered plugins");
    for descriptor in registry.descriptors() {
        ui::section(&format!("{} ({})", descriptor.name, descriptor.kind));
        if ctx.quiet {
            continue;
        }
        for line in schema_lines(&descriptor.schema) {
            println!("  {line}");
        }
    }
    println!();
    ui::info(&format!("{} plugin(s)", registry.len()));
    Ok(())
}

fn schema_lines(schema: &Schema) -> Vec<String> {
    if schema.fields().is_empty() {
        return vec!["(no configuration)".to_string()];
    }
    schema
        .fields()
        .iter()
        .map(|f| {
            let req = if f.required { "required" } else { "optional" };
            format!("{}: {} ({req})", f.key, f.ty)
        })
        .collect()
}
