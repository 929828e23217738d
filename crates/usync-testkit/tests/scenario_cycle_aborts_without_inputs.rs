//! Scenario: cycles that cannot read their inputs abort cleanly.
//!
//! # Invariants under test
//!
//! 1. Desired set unavailable => `DesiredUnavailable`, zero remote calls,
//!    snapshot untouched.
//! 2. Snapshot unreadable => `SnapshotLoad`, zero remote calls.
//! 3. Snapshot not writable => mutations and settlement still ran, the error
//!    carries the cycle report, and the stored snapshot is the previous one.
//! 4. The next cycle after the source recovers converges normally.

use anyhow::Result;
use usync_runtime::CycleError;
use usync_testkit::{panel_account, Harness};

#[tokio::test]
async fn desired_unavailable_mutates_nothing() -> Result<()> {
    let h = Harness::new(vec![panel_account(1001, "a")]);
    h.cycle().await?;
    h.control.clear_calls();
    let before = h.store.applied();

    h.source.set_unavailable(true);
    let err = h.cycle().await.expect_err("cycle must abort");

    assert!(matches!(err, CycleError::DesiredUnavailable(_)), "{err}");
    assert!(err.report().is_none());
    assert!(h.control.calls().is_empty());
    assert_eq!(h.store.applied(), before);

    h.source.set_unavailable(false);
    h.source.set_rows(vec![panel_account(1001, "a"), panel_account(1002, "b")]);
    let report = h.cycle().await?;
    assert_eq!(report.added, vec!["1002"]);
    Ok(())
}

#[tokio::test]
async fn unreadable_snapshot_mutates_nothing() -> Result<()> {
    let h = Harness::new(vec![panel_account(1001, "a")]);
    h.store.set_fail_load(true);

    let err = h.cycle().await.expect_err("cycle must abort");

    assert!(matches!(err, CycleError::SnapshotLoad(_)), "{err}");
    assert!(h.control.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn unwritable_snapshot_reports_the_cycle() -> Result<()> {
    let h = Harness::new(vec![panel_account(1001, "a")]);
    h.store.set_fail_save(true);

    let err = h.cycle().await.expect_err("save must fail");

    let report = err.report().expect("save failure carries the report");
    assert_eq!(report.added, vec!["1001"]);
    assert!(h.control.has_user("1001"));
    assert!(h.store.applied().is_empty());
    Ok(())
}
