//! Scenario file support for the simulator CLI

use arq_protocol::HEADER_SIZE;
use arq_sim::{standard_suite, LinkConfig, MessageSpec, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A set of scenarios loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Config {
    /// Load scenarios from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioFileError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate scenarios from TOML text
    pub fn parse(contents: &str) -> Result<Self, ScenarioFileError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save scenarios to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioFileError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ScenarioFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The built-in scenario suite
    pub fn standard() -> Self {
        Config {
            scenarios: standard_suite(),
        }
    }

    /// Small example file
    pub fn example() -> Self {
        Config {
            scenarios: vec![
                Scenario::new(
                    "Lossy link",
                    LinkConfig::new(2).with_mtu(200).with_loss(0.1),
                    MessageSpec::new("hello, world", 50),
                    2000,
                ),
                Scenario::new(
                    "Reordering link",
                    LinkConfig::new(10)
                        .with_mtu(64)
                        .with_reorder(8)
                        .with_seed(7),
                    MessageSpec::new("x".repeat(500), 4),
                    2000,
                ),
            ],
        }
    }

    /// Keep only scenarios whose name contains `filter` (case-insensitive)
    pub fn filtered(mut self, filter: &str) -> Self {
        let needle = filter.to_lowercase();
        self.scenarios
            .retain(|s| s.name.to_lowercase().contains(&needle));
        self
    }

    /// Reject scenarios that cannot run
    pub fn validate(&self) -> Result<(), ScenarioFileError> {
        let mut names = HashSet::new();

        for scenario in &self.scenarios {
            let name = &scenario.name;
            if name.trim().is_empty() {
                return Err(ScenarioFileError::Invalid("scenario name is empty".into()));
            }
            if !names.insert(name.as_str()) {
                return Err(ScenarioFileError::Invalid(format!(
                    "duplicate scenario name '{name}'"
                )));
            }
            if scenario.link.mtu <= HEADER_SIZE {
                return Err(ScenarioFileError::Invalid(format!(
                    "'{name}': mtu {} must exceed the {HEADER_SIZE}-byte header",
                    scenario.link.mtu
                )));
            }
            for (field, value) in [
                ("packet_loss", scenario.link.packet_loss),
                ("corruption", scenario.link.corruption),
            ] {
                if let Some(p) = value {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(ScenarioFileError::Invalid(format!(
                            "'{name}': {field} {p} is not a probability"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Scenario file errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid scenario file: {0}")]
    Invalid(String),
}
