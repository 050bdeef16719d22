use mdi_engine::core::channel::ChannelError;
use mdi_engine::core::io::SystemFileError;
use mdi_engine::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Could not load system: {0}")]
    System(#[from] SystemFileError),

    #[error("Could not reach the driver: {0}")]
    Connection(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker {rank} panicked")]
    WorkerPanicked { rank: usize },
}
