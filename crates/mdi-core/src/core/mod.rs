//! # Core Module
//!
//! The stateless foundation of the engine: the protocol vocabulary and schema, the
//! transports to the driver and between workers, the data models, and the
//! simulation backend the engine steers.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]) - Nodes, commands, and the node/command schema
//! - **Driver Channel** ([`channel`]) - Fixed-width wire format over TCP, and an in-memory link
//! - **Parallel World** ([`comm`]) - Lockstep collectives between the workers
//! - **Molecular Representation** ([`models`]) - Tagged atoms, the cell, groups, slab ownership
//! - **Simulation** ([`simulation`]) - Step phases of dynamics and minimization, with a
//!   reference Lennard-Jones backend
//! - **File I/O** ([`io`]) - TOML system definitions
//! - **Units** ([`units`]) - Engine unit styles and conversion to the driver's atomic units

pub mod channel;
pub mod comm;
pub mod io;
pub mod models;
pub mod protocol;
pub mod simulation;
pub mod units;
