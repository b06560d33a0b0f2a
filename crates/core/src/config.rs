//! Configuration for access resolution

use crate::Result;
use crate::access::{DEFAULT_RESOURCE_KINDS, ResourceKindRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Database holding access controls and memberships
    pub database_url: String,

    /// Valid resource kinds; `project` and `organization` are always added
    pub resource_kinds: Vec<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://warden.db".to_string(),
            resource_kinds: DEFAULT_RESOURCE_KINDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from file, with `WARDEN_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("resource_kinds", defaults.resource_kinds)?
            .add_source(Self::environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn registry(&self) -> ResourceKindRegistry {
        ResourceKindRegistry::new(self.resource_kinds.iter().cloned())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("WARDEN")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("resource_kinds")
    }
}
