//! Loading of TOML system definitions: cell, per-type masses, pair coefficients,
//! and the atoms with their persistent tags.

pub mod system_file;

pub use system_file::{PairEntry, SystemDefinition, SystemFileError};
