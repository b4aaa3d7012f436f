//! brew-daemon library target.
//!
//! Exposes the router, state and service wiring for integration tests and
//! for the `brew` CLI. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod bootstrap;
pub mod intake;
pub mod routes;
pub mod state;
