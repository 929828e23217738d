//! usync-daemon library target.
//!
//! Exposes the run loop, router and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod routes;
pub mod run_loop;
pub mod state;
