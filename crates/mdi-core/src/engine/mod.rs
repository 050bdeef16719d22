//! # Engine Module
//!
//! The stateful side of a driver session: the node state machine that serves driver
//! commands, and the marshalling of per-atom data between the driver and the workers.
//!
//! ## Architecture
//!
//! - **State Machine** ([`machine`]) - [`MdiEngine`](machine::MdiEngine), with the
//!   re-entrant `resume` entry point, command dispatch, and the step drivers that call
//!   back into it at each node
//! - **Control State** ([`state`]) - Current and target nodes, exit flags, run phase
//! - **Data Marshaller** ([`marshal`]) - Driver relay, tag-keyed gather and scatter
//! - **External Forces** ([`forces`]) - The persistent `+PRE-FORCES` buffer
//! - **Configuration** ([`config`]) - Schema policy, force group, bootstrap length
//! - **Progress Monitoring** ([`progress`]) - Events for command and step progress
//! - **Error Handling** ([`error`]) - Usage, protocol, and transport failures
//!
//! ## Failure Model
//!
//! Every error ends the session. Workers never diverge on the way out: a failed
//! driver exchange on the authoritative worker is relayed to the others, which return
//! [`EngineError::PeerAborted`](error::EngineError::PeerAborted).

pub mod config;
pub mod error;
pub mod forces;
pub mod machine;
pub mod marshal;
pub mod progress;
pub mod state;
