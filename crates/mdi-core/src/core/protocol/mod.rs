//! # Protocol Schema
//!
//! Nodes, the command vocabulary, and the static table of which commands each
//! node accepts.

pub mod command;
pub mod node;
pub mod schema;

pub use command::{Command, UnknownCommand};
pub use node::Node;
pub use schema::{SchemaPolicy, is_valid};

/// Reply to `STATUS`.
pub const READY: &str = "READY";
