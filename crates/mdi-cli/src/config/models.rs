use mdi_engine::core::units::UnitStyle;
use mdi_engine::engine::config::EngineConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub system_path: PathBuf,
    pub hostname: String,
    pub port: u16,
    pub ranks: usize,
    /// Replaces the unit style declared in the system file.
    pub units: Option<UnitStyle>,
    pub engine: EngineConfig,
}
