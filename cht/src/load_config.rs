/// `load_config` module: loads the optional YAML config file into a [`CliConfig`].
///
/// This module is the only place where user-supplied YAML is parsed and mapped
/// to the strongly-typed product settings of the core crate.
///
/// # Responsibilities
/// - Locate the config file: an explicit `--config` path wins, then the
///   `CHT_CONFIG` environment variable; with neither, defaults apply
/// - Parse the YAML into type-safe structs, rejecting unknown keys
/// - Turn per-product overrides into a [`ProductCatalog`]
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics,
/// and are surfaced at the CLI boundary.
///
/// Accepted schema:
/// ```yaml
/// output_dir: ./out
/// products:
///   "101": { extension: txt, key_field: company_number,
///            deletion_marker: { field: action, value: D } }
/// ```
use anyhow::Result;
use cht_core::contract::ProductId;
use cht_core::product::{ProductCatalog, ProductSettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV: &str = "CHT_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Directory that `--output` writes files into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Per-product overrides; products not listed keep their defaults.
    #[serde(default)]
    pub products: BTreeMap<ProductId, ProductSettings>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            products: BTreeMap::new(),
        }
    }
}

impl CliConfig {
    pub fn catalog(&self) -> ProductCatalog {
        ProductCatalog::with_overrides(self.products.clone())
    }
}

/// Loads the config from `explicit`, else from `$CHT_CONFIG`, else returns defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => {
                info!("No config file given, using defaults");
                return Ok(CliConfig::default());
            }
        },
    };
    load_config_file(path)
}

/// Loads and parses a YAML config file.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    info!(
        output_dir = %config.output_dir.display(),
        overrides = config.products.len(),
        "Config loaded"
    );
    Ok(config)
}
