//! In-memory collaborators for driving reconcile cycles in tests.
//!
//! Every fake here is deterministic and shareable (`Arc`), so a scenario can
//! hand one clone to the [`Reconciler`](usync_runtime::Reconciler) and keep
//! another to inspect or to inject failures between cycles.

mod control;
mod harness;
mod sources;

pub use control::{Call, FakeControlPlane};
pub use harness::Harness;
pub use sources::{RecordingLedger, ScriptedStore, StaticSource};

use usync_schemas::Account;

/// Account on the default inbound with level 0, password derived the way the
/// panel derives it.
pub fn panel_account(port: u16, passwd: &str) -> Account {
    Account::new(port.to_string(), 0, "ssapi", format!("{port}{passwd}"))
}
