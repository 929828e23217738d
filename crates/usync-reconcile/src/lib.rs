//! usync-reconcile
//!
//! Three-way diff between the desired set (panel database) and the applied
//! set (snapshot). Produces the minimal list of control-plane mutations that
//! converges the proxy.
//!
//! Deterministic, pure logic. No IO. No control-plane calls.

mod engine;
mod types;

pub use engine::{is_converged, plan};
pub use types::*;
