//! # MDI Engine Library
//!
//! The engine side of a driver-steered simulation session. An external driver
//! connects over a fixed-width command channel and, at named nodes inside the
//! simulation loop, reads and writes atomic state, requests dynamics steps or
//! minimizer iterations, and decides when runs and the session end.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers at every scale:
//!
//! - **[`core`]: The Foundation.** Stateless pieces: the protocol vocabulary and the
//!   node/command schema, the driver wire format and transports, the collectives
//!   between workers, tagged atom storage, units, and a reference Lennard-Jones
//!   simulation that supplies the integrator and minimizer phases.
//!
//! - **[`engine`]: The Logic Core.** The re-entrant node state machine
//!   ([`engine::machine::MdiEngine`]) and the data marshaller that moves per-atom
//!   arrays between the driver and the distributed atom store.
//!
//! - **[`workflows`]: The Public API.** The session loop that serves a driver from
//!   `@DEFAULT` until it exits.

pub mod core;
pub mod engine;
pub mod workflows;
