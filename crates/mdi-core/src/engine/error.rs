use thiserror::Error;

use super::config::ConfigError;
use super::state::InitMode;
use crate::core::channel::ChannelError;
use crate::core::comm::CommError;
use crate::core::models::atom::AtomTag;
use crate::core::protocol::{Command, Node};
use crate::core::simulation::{MinStatus, SimulationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("Atom tag {0} is not owned by any worker")]
    MissingAtomTag(AtomTag),

    #[error("Atom tags are not consecutive: each of 1..={natoms} must be owned exactly once")]
    NonConsecutiveTags { natoms: usize },

    #[error("Atomic propagation method already initialized ({mode})")]
    AlreadyInitialized { mode: InitMode },

    #[error("Driver reported {received} atoms but the system has {expected}")]
    AtomCountMismatch { expected: usize, received: i32 },

    #[error("Command '{0}' requires MD_INIT or OPTG_INIT first")]
    NotInitialized(Command),

    #[error("The authoritative worker has no driver channel")]
    MissingDriverChannel,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command from driver: '{0}'")]
    UnknownCommand(String),

    #[error("Command '{command}' is not allowed at node {node}")]
    CommandNotAllowedAtNode { command: Command, node: Node },

    #[error("Received unsupported command '{command}' at node {node}")]
    UnsupportedCommand { command: Command, node: Node },

    #[error("Optimization ended ({status:?}) before the driver sent a terminal command")]
    OptimizationEnded { status: MinStatus },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Driver channel failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("Worker world failed: {0}")]
    Comm(#[from] CommError),

    #[error("Simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("The authoritative worker aborted the session")]
    PeerAborted,
}
