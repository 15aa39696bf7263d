#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{Result, ScopeError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

/// How exposed members are kept in sync with the view state after the initial projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ObservationMode {
    /// Native observation when the view state can defer work, accessor interception otherwise.
    #[default]
    Auto,
    /// Batch member changes and re-project them on the host's next pass.
    Native,
    /// Write every member change straight through to the view state.
    Accessor,
}

impl fmt::Display for ObservationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObservationMode::Auto => "auto",
            ObservationMode::Native => "native",
            ObservationMode::Accessor => "accessor",
        };
        f.write_str(name)
    }
}

impl FromStr for ObservationMode {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ObservationMode::Auto),
            "native" => Ok(ObservationMode::Native),
            "accessor" => Ok(ObservationMode::Accessor),
            other => Err(ScopeError::InvalidConfigValueError {
                field: "settings.observation".to_string(),
                value: other.to_string(),
                reason: "Valid values: auto, native, accessor".to_string(),
            }),
        }
    }
}

/// Naming conventions and sync behaviour shared by every component of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dependency name under which the view state is injected.
    pub scope_dependency: String,
    /// Sigil tried in front of a dependency name that lacks it.
    pub service_prefix: String,
    /// Suffix tried after a dependency name that lacks it.
    pub service_suffix: String,
    /// Separates a controller name from its alias, matched case-insensitively.
    pub statement_delimiter: String,
    /// Event emitted on the view state once a controller is initialized.
    pub init_event: String,
    pub observation: ObservationMode,
    /// Dirty rounds the in-memory scope tolerates in one digest.
    pub digest_ttl: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scope_dependency: "$scope".to_string(),
            service_prefix: "$".to_string(),
            service_suffix: ".service".to_string(),
            statement_delimiter: " as ".to_string(),
            init_event: "ctrl:init".to_string(),
            observation: ObservationMode::Auto,
            digest_ttl: 10,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("settings.scope_dependency", &self.scope_dependency)?;
        validation::validate_non_empty_string("settings.service_prefix", &self.service_prefix)?;
        validation::validate_non_empty_string("settings.service_suffix", &self.service_suffix)?;
        // 分隔字串前後通常帶空白，只檢查去掉空白後仍有內容
        validation::validate_non_empty_string(
            "settings.statement_delimiter",
            &self.statement_delimiter,
        )?;
        validation::validate_non_empty_string("settings.init_event", &self.init_event)?;
        validation::validate_range("settings.digest_ttl", self.digest_ttl, 1, 100)?;
        Ok(())
    }
}
