use crate::core::models::group::AtomGroup;
use crate::core::protocol::SchemaPolicy;
use thiserror::Error;

/// Silent minimizer iterations run by `OPTG_INIT` before the driver regains control.
pub const DEFAULT_OPTG_BOOTSTRAP_ITERATIONS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub schema_policy: SchemaPolicy,
    /// Atoms that receive the driver's `+PRE-FORCES` contribution.
    pub group: AtomGroup,
    pub optg_bootstrap_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_policy: SchemaPolicy::Strict,
            group: AtomGroup::All,
            optg_bootstrap_iterations: DEFAULT_OPTG_BOOTSTRAP_ITERATIONS,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Checks the configuration against a system of `natoms` atoms.
    pub fn validate(&self, natoms: usize) -> Result<(), ConfigError> {
        if let AtomGroup::Tags(tags) = &self.group {
            if tags.is_empty() {
                return Err(ConfigError::InvalidParameter {
                    name: "group",
                    reason: "group lists no atoms".to_string(),
                });
            }
            if let Some(tag) = tags.iter().find(|t| t.0 == 0 || t.0 as usize > natoms) {
                return Err(ConfigError::InvalidParameter {
                    name: "group",
                    reason: format!("atom tag {} is outside 1..={}", tag, natoms),
                });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    schema_policy: Option<SchemaPolicy>,
    group: Option<AtomGroup>,
    optg_bootstrap_iterations: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = Some(policy);
        self
    }
    pub fn group(mut self, group: AtomGroup) -> Self {
        self.group = Some(group);
        self
    }
    pub fn group_tags<I: IntoIterator<Item = u32>>(self, tags: I) -> Self {
        self.group(AtomGroup::from_tags(tags))
    }
    pub fn optg_bootstrap_iterations(mut self, iterations: usize) -> Self {
        self.optg_bootstrap_iterations = Some(iterations);
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            schema_policy: self.schema_policy.unwrap_or(defaults.schema_policy),
            group: self.group.unwrap_or(defaults.group),
            optg_bootstrap_iterations: self
                .optg_bootstrap_iterations
                .unwrap_or(defaults.optg_bootstrap_iterations),
        };
        if let AtomGroup::Tags(tags) = &config.group {
            if tags.is_empty() {
                return Err(ConfigError::InvalidParameter {
                    name: "group",
                    reason: "group lists no atoms".to_string(),
                });
            }
        }
        Ok(config)
    }
}
