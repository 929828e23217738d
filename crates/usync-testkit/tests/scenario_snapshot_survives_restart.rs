//! Scenario: the file-backed snapshot carries state across restarts.
//!
//! # Invariants under test
//!
//! 1. A new reconciler over the same snapshot file (same remote) issues no
//!    mutations: the applied set was persisted.
//! 2. A cold start (snapshot reset) against a freshly started remote re-adds
//!    every desired account.
//! 3. A cold start against a remote that kept its users cannot re-adopt them:
//!    every add is rejected as a duplicate, nothing enters the snapshot, and
//!    later credential changes and removals for those accounts are never
//!    issued.

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;
use usync_runtime::{Reconciler, ReconcilerOptions};
use usync_state::{JsonFileStore, SnapshotStore};
use usync_testkit::{panel_account, Call, FakeControlPlane, RecordingLedger, StaticSource};

fn reconciler(
    source: Arc<StaticSource>,
    path: &std::path::Path,
    control: Arc<FakeControlPlane>,
) -> Reconciler {
    Reconciler::new(
        source,
        Arc::new(JsonFileStore::new(path)),
        control,
        Arc::new(RecordingLedger::new()),
        ReconcilerOptions::default(),
    )
}

#[tokio::test]
async fn restart_with_persisted_snapshot_is_a_no_op() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("current_users.json");
    let source = Arc::new(StaticSource::new(vec![
        panel_account(1001, "a"),
        panel_account(1002, "b"),
    ]));
    let control = Arc::new(FakeControlPlane::new());

    let first = reconciler(source.clone(), &path, control.clone());
    first.run_cycle().await?;
    drop(first);
    assert!(path.exists());
    control.clear_calls();

    let second = reconciler(source.clone(), &path, control.clone());
    let report = second.run_cycle().await?;

    assert!(control.mutations().is_empty(), "{:?}", control.mutations());
    assert_eq!(report.applied, 2);
    assert_eq!(JsonFileStore::new(&path).load()?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn cold_start_resynchronizes_from_empty() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("current_users.json");
    let source = Arc::new(StaticSource::new(vec![
        panel_account(1001, "a"),
        panel_account(1002, "b"),
    ]));

    reconciler(source.clone(), &path, Arc::new(FakeControlPlane::new()))
        .run_cycle()
        .await?;

    // Proxy restarted with no users; daemon restarted with a cold start.
    let fresh = Arc::new(FakeControlPlane::new());
    let r = reconciler(source, &path, fresh.clone());
    r.cold_start()?;
    assert!(!path.exists());

    let report = r.run_cycle().await?;
    assert_eq!(report.added, vec!["1001", "1002"]);
    assert_eq!(fresh.users().len(), 2);
    Ok(())
}

#[tokio::test]
async fn cold_start_against_live_remote_never_readopts_accounts() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("current_users.json");
    let source = Arc::new(StaticSource::new(vec![
        panel_account(1001, "a"),
        panel_account(1002, "b"),
    ]));
    let control = Arc::new(FakeControlPlane::new());

    reconciler(source.clone(), &path, control.clone())
        .run_cycle()
        .await?;

    // Daemon restarted with a cold start; the proxy kept running.
    let r = reconciler(source.clone(), &path, control.clone());
    r.cold_start()?;

    for _ in 0..2 {
        let report = r.run_cycle().await?;
        assert!(report.added.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().all(|f| f.error.contains("already exists")));
        assert_eq!(report.applied, 0);
    }

    // A password change and a disable are both invisible to the diff.
    source.set_rows(vec![panel_account(1001, "z")]);
    control.clear_calls();
    let report = r.run_cycle().await?;
    assert_eq!(
        control.mutations(),
        vec![Call::Add {
            email: "1001".to_string(),
            inbound_tag: "ssapi".to_string(),
        }]
    );
    assert!(report.updated.is_empty() && report.removed.is_empty());
    assert!(control.has_user("1002"));
    assert_eq!(
        control.users().get("1001").map(|a| a.password.clone()),
        Some("1001a".to_string())
    );
    Ok(())
}
