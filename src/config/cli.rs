use crate::config::{ObservationMode, Settings};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "scopebind")]
#[command(about = "Load a component module from TOML, mount its controllers on a scope and run a script")]
pub struct CliConfig {
    /// Path to the TOML module description
    #[arg(short, long, default_value = "scopebind.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Override the observation strategy from the module settings
    #[arg(long, value_enum)]
    pub observation: Option<ObservationMode>,

    /// Validate and build the module without mounting anything
    #[arg(long)]
    pub dry_run: bool,
}

impl CliConfig {
    /// Apply command-line overrides on top of the module settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(mode) = self.observation {
            tracing::info!("🔧 observation overridden to: {}", mode);
            settings.observation = mode;
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("config", &self.config)?;
        if !self.config.ends_with(".toml") {
            tracing::warn!("⚠️ '{}' does not have a .toml extension", self.config);
        }
        Ok(())
    }
}
