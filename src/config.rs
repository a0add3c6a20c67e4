use anyhow::{Context, Result, bail};
use enactor::{EnactOptions, InfraDocument, LoadOptions, RollbackScope};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("infrakit"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

// ============================================================================
// Application Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Worker threads per wave
    pub jobs: usize,
    /// Per-instruction timeout in seconds
    pub instruction_timeout_secs: Option<u64>,
    pub rollback_scope: RollbackScope,
    pub name_max_len: usize,
    /// Resolver for node families without a `filter`
    pub default_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            instruction_timeout_secs: None,
            rollback_scope: RollbackScope::WholeRun,
            name_max_len: enactor::naming::DEFAULT_MAX_LEN,
            default_filter: "local".to_string(),
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub rollback_scope: Option<RollbackScope>,
}

impl AppConfig {
    /// Load `~/.config/infrakit/config.toml`, or defaults when it is absent
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("config.toml");
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        if config.jobs == 0 {
            bail!("'jobs' in {} must be at least 1", path.display());
        }
        Ok(config)
    }

    pub fn enact_options(&self, overrides: &Overrides) -> EnactOptions {
        EnactOptions {
            jobs: overrides.jobs.unwrap_or(self.jobs).max(1),
            instruction_timeout: overrides
                .timeout_secs
                .or(self.instruction_timeout_secs)
                .map(Duration::from_secs),
            rollback_scope: overrides.rollback_scope.unwrap_or(self.rollback_scope),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            default_filter: Some(self.default_filter.clone()),
            name_max_len: self.name_max_len,
        }
    }
}

// ============================================================================
// Infrastructure Files
// ============================================================================

/// Read an infrastructure document; `.json` files are JSON, anything else TOML
pub fn load_infra(path: &Path) -> Result<InfraDocument> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid infrastructure file {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Invalid infrastructure file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.jobs, 4);
        assert_eq!(config.name_max_len, 63);
        assert_eq!(config.default_filter, "local");
        assert_eq!(config.rollback_scope, RollbackScope::WholeRun);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = 8\nrollback_scope = \"failed_nodes\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.jobs, 8);
        assert_eq!(config.rollback_scope, RollbackScope::FailedNodes);
        assert_eq!(config.default_filter, "local");
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jobs = 0\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());

        fs::write(&path, "workers = 3\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = AppConfig {
            instruction_timeout_secs: Some(60),
            ..Default::default()
        };
        let opts = config.enact_options(&Overrides {
            jobs: Some(2),
            timeout_secs: None,
            rollback_scope: Some(RollbackScope::FailedNodes),
        });
        assert_eq!(opts.jobs, 2);
        assert_eq!(opts.instruction_timeout, Some(Duration::from_secs(60)));
        assert_eq!(opts.rollback_scope, RollbackScope::FailedNodes);
    }

    #[test]
    fn test_load_infra_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("infra.toml");
        fs::write(
            &toml_path,
            "infra_name = \"demo\"\n[[nodes]]\nname = \"web\"\ncount = 2\n",
        )
        .unwrap();
        let doc = load_infra(&toml_path).unwrap();
        assert_eq!(doc.infra_name, "demo");
        assert_eq!(doc.nodes[0].count, 2);

        let json_path = dir.path().join("infra.json");
        fs::write(
            &json_path,
            r#"{"infra_name": "demo", "nodes": [{"name": "db"}]}"#,
        )
        .unwrap();
        let doc = load_infra(&json_path).unwrap();
        assert_eq!(doc.nodes[0].name, "db");
        assert_eq!(doc.nodes[0].count, 1);
    }

    #[test]
    fn test_load_infra_missing_file() {
        let err = load_infra(Path::new("/nonexistent/infra.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}
