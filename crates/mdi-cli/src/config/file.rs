use crate::error::{CliError, Result};
use mdi_engine::core::protocol::SchemaPolicy;
use mdi_engine::core::units::UnitStyle;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDriverConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEngineConfig {
    pub ranks: Option<usize>,
    pub units: Option<UnitStyle>,
    pub schema_policy: Option<SchemaPolicy>,
    /// Tags of the atoms that receive driver `+PRE-FORCES`; all atoms when absent.
    pub group: Option<Vec<u32>>,
    pub optg_bootstrap_iterations: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub driver: Option<FileDriverConfig>,
    pub engine: Option<FileEngineConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
