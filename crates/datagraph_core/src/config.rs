// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation settings, stored as RON.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Solver settings and cycle policy applied to a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Iteration cap for relaxation
    pub max_cycle_steps: usize,
    /// Summed change below which relaxation stops
    pub cycle_stop_threshold: f32,
    /// Evaluate cyclic graphs instead of rejecting them
    pub cycles_allowed: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_cycle_steps: 64,
            cycle_stop_threshold: 0.0005,
            cycles_allowed: false,
        }
    }
}

impl GraphSettings {
    /// Parse settings from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize settings to RON text
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), "Loaded graph settings");
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = GraphSettings::from_ron("(cycles_allowed: true)").unwrap();
        assert!(settings.cycles_allowed);
        assert_eq!(settings.max_cycle_steps, 64);
        assert_eq!(settings.cycle_stop_threshold, 0.0005);
    }

    #[test]
    fn test_save_load_file() {
        let file = format!("datagraph-settings-{}.ron", std::process::id());
        let path = std::env::temp_dir().join(file);
        let settings = GraphSettings {
            max_cycle_steps: 10,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(GraphSettings::load(&path).unwrap(), settings);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_parse_error() {
        assert!(GraphSettings::from_ron("(max_cycle_steps: \"many\")").is_err());
    }
}
