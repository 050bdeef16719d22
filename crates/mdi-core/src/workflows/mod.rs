//! # Workflows Module
//!
//! Top-level entry points that tie the engine and the core together.
//!
//! - **Driver Session** ([`session`]) - Serves a driver from `@DEFAULT` until it exits,
//!   stepping the runs it requests with `@INIT_MD` and `@INIT_OPTG`

pub mod session;
