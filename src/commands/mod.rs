pub mod apply;
pub mod plan;
pub mod plugins;
pub mod validate;

use crate::config::{self, AppConfig};
use anyhow::{Context, Result};
use enactor::{Infrastructure, Registry};
use std::path::Path;

/// Read and validate an infrastructure file
pub(crate) fn load_infrastructure(
    file: &Path,
    app: &AppConfig,
    registry: &Registry,
) -> Result<Infrastructure> {
    let doc = config::load_infra(file)?;
    enactor::load(&doc, registry, &app.load_options())
        .with_context(|| format!("Invalid infrastructure in {}", file.display()))
}
