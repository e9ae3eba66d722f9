use anyhow::Result;
use herald::units::{content, research, UnitRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::configuration::Settings;
use crate::error::ConfigError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<UnitRegistry>,
    /// Deadline for runs whose request names none
    pub default_deadline: Option<Duration>,
}

impl AppState {
    pub fn new(registry: UnitRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            default_deadline: None,
        }
    }

    pub fn with_default_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Build every unit named in the settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let unit_config = settings.unit_config();
        let mut registry = UnitRegistry::new();

        for name in &settings.agents {
            let unit = match name.trim() {
                research::RESEARCH_AGENT => research::build(&unit_config)?,
                content::CONTENT_AGENT => content::build(&unit_config)?,
                other => return Err(ConfigError::UnknownAgent(other.to_string()).into()),
            };
            info!(agent = %name.trim(), provider = %unit_config.provider.provider_type(), "hosting agent");
            registry.register(Arc::new(unit));
        }

        if registry.is_empty() {
            return Err(ConfigError::NoAgents.into());
        }

        Ok(Self::new(registry).with_default_deadline(settings.default_deadline()))
    }
}
