//! # Models
//!
//! Per-worker atom storage keyed by persistent atom tags, the simulation cell,
//! atom groups, and the reference slab ownership rule.

pub mod atom;
pub mod cell;
pub mod decomposition;
pub mod group;
