use std::sync::Arc;
use std::time::Duration;

use usync_runtime::{CycleError, CycleReport, Reconciler, ReconcilerOptions};
use usync_schemas::Account;

use crate::{FakeControlPlane, RecordingLedger, ScriptedStore, StaticSource};

/// A reconciler wired to fakes, with handles kept for inspection.
pub struct Harness {
    pub source: Arc<StaticSource>,
    pub store: Arc<ScriptedStore>,
    pub control: Arc<FakeControlPlane>,
    pub ledger: Arc<RecordingLedger>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(rows: Vec<Account>) -> Self {
        Self::with_control(rows, FakeControlPlane::new(), ReconcilerOptions::default())
    }

    pub fn with_control(
        rows: Vec<Account>,
        control: FakeControlPlane,
        opts: ReconcilerOptions,
    ) -> Self {
        let source = Arc::new(StaticSource::new(rows));
        let store = Arc::new(ScriptedStore::new());
        let control = Arc::new(control);
        let ledger = Arc::new(RecordingLedger::new());
        let reconciler = Reconciler::new(
            source.clone(),
            store.clone(),
            control.clone(),
            ledger.clone(),
            opts,
        );
        Self {
            source,
            store,
            control,
            ledger,
            reconciler,
        }
    }

    /// Short call bound with stalls that always exceed it.
    pub fn with_stalls(rows: Vec<Account>) -> Self {
        let opts = ReconcilerOptions {
            call_timeout: Duration::from_millis(20),
            ..ReconcilerOptions::default()
        };
        Self::with_control(
            rows,
            FakeControlPlane::with_stall(Duration::from_millis(500)),
            opts,
        )
    }

    pub async fn cycle(&self) -> Result<CycleReport, CycleError> {
        self.reconciler.run_cycle().await
    }
}
