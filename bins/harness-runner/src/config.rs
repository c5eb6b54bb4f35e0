// Interpreter registry for the harness runner
use anyhow::{Context, Result};
use harness_common::suites::SuiteVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::interpreter::ProcessInterpreterFactory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    pub version: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl InterpreterConfig {
    /// `interpreterv<N>` on PATH, matching the per-version interpreter naming
    pub fn fallback(version: SuiteVersion) -> Self {
        Self {
            version: version.to_string(),
            command: format!("interpreterv{}", version),
            args: Vec::new(),
        }
    }

    pub fn factory(&self) -> ProcessInterpreterFactory {
        ProcessInterpreterFactory::new(self.command.clone(), self.args.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InterpretersJson {
    interpreters: Vec<InterpreterConfig>,
}

/// Interpreter configuration manager
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfigManager {
    configs: HashMap<String, InterpreterConfig>,
}

impl InterpreterConfigManager {
    /// Load interpreter configurations from a registry file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let interpreters_json: InterpretersJson = serde_json::from_str(content)?;

        let mut configs = HashMap::new();
        for interpreter in interpreters_json.interpreters {
            configs.insert(interpreter.version.clone(), interpreter);
        }

        Ok(Self { configs })
    }

    /// Load the registry if present; a missing file means every version uses its fallback
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            warn!(
                path = %config_path.display(),
                "Interpreter registry not found, using interpreterv<N> from PATH"
            );
            return Ok(Self::default());
        }
        Self::load(config_path)
    }

    /// Get configuration for a suite version, falling back to the PATH default
    pub fn get_config(&self, version: SuiteVersion) -> InterpreterConfig {
        match self.configs.get(version.as_str()) {
            Some(config) => config.clone(),
            None => {
                debug!(%version, "No registry entry, using fallback interpreter");
                InterpreterConfig::fallback(version)
            }
        }
    }

    /// List all configured versions
    pub fn list_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.configs.keys().cloned().collect();
        versions.sort();
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "interpreters": [
            { "version": "1", "command": "python3", "args": ["bridge.py", "interpreterv1"] },
            { "version": "3", "command": "/opt/interp/v3" }
        ]
    }"#;

    #[test]
    fn test_parse_registry() {
        let manager = InterpreterConfigManager::parse(REGISTRY).unwrap();
        assert_eq!(manager.list_versions(), vec!["1", "3"]);

        let v1 = manager.get_config(SuiteVersion::V1);
        assert_eq!(v1.command, "python3");
        assert_eq!(v1.args, vec!["bridge.py", "interpreterv1"]);

        let v3 = manager.get_config(SuiteVersion::V3);
        assert!(v3.args.is_empty());
        assert_eq!(v3.factory().command(), "/opt/interp/v3");
    }

    #[test]
    fn test_missing_entry_falls_back() {
        let manager = InterpreterConfigManager::parse(REGISTRY).unwrap();
        assert_eq!(
            manager.get_config(SuiteVersion::V2),
            InterpreterConfig {
                version: "2".to_string(),
                command: "interpreterv2".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let manager =
            InterpreterConfigManager::load_or_default(Path::new("does/not/exist.json")).unwrap();
        assert!(manager.list_versions().is_empty());
        assert_eq!(manager.get_config(SuiteVersion::V1).command, "interpreterv1");
    }

    #[test]
    fn test_malformed_registry_is_error() {
        assert!(InterpreterConfigManager::parse(r#"{"interpreters": 3}"#).is_err());
    }
}
