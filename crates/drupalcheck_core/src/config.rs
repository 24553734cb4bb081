//! Checker configuration.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::CheckerError;
use crate::diagnostic::{Severity, SeverityMap};

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// When the language server re-checks a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunTrigger {
    /// Check on open and on save.
    #[default]
    OnSave,
    /// Also check (debounced) while typing.
    OnType,
}

/// Severity mapping as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityConfig {
    #[serde(default)]
    pub default: Severity,
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

/// Configuration for the checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerConfig {
    /// Executable name or path.
    #[serde(default = "default_executable_path")]
    pub executable_path: String,

    /// Seconds before a running analyzer is killed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Arguments passed before `--format=json`.
    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub severity: SeverityConfig,

    /// Upper bound on analyzer processes running at once.
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    #[serde(default)]
    pub run: RunTrigger,

    /// Directory containing the configuration file, if loaded from one.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_executable_path() -> String {
    "drupal-check".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_checks() -> usize {
    4
}

impl CheckerConfig {
    /// Configuration file names, in lookup order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".drupalcheck.json"];

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            executable_path: default_executable_path(),
            timeout_secs: default_timeout_secs(),
            extra_args: Vec::new(),
            severity: SeverityConfig::default(),
            max_concurrent_checks: default_max_concurrent_checks(),
            run: RunTrigger::default(),
            base_dir: None,
        }
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CheckerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CheckerError::config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_json(&content)?;
        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses configuration from a JSON string with schema validation.
    pub fn from_json(json: &str) -> Result<Self, CheckerError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| CheckerError::config(format!("Invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Validates and converts an already-parsed JSON value.
    ///
    /// Used for LSP `initializationOptions`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CheckerError> {
        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: serde_json::Value =
                serde_json::from_str(SCHEMA_JSON).expect("Invalid embedded config schema");
            Validator::new(&schema_json).expect("Invalid config schema compilation")
        });

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(CheckerError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| CheckerError::config(format!("Invalid config: {}", e)))
    }

    /// Finds a configuration file directly under `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        Self::CONFIG_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Returns the analyzer timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the severity lookup table.
    pub fn severity_map(&self) -> SeverityMap {
        SeverityMap::new(self.severity.default, self.severity.overrides.clone())
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::new()
    }
}
