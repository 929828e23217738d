//! Scenario: a hung control-plane call is bounded and isolated.
//!
//! # Invariants under test
//!
//! 1. A call that outlives the per-call bound fails as a timeout for that
//!    account only; the other accounts converge in the same cycle.
//! 2. The timed-out account is not recorded as applied and is retried.
//! 3. A stalled counter read counts as zero for that direction only, leaves
//!    the counter unreset, and does not hold up other accounts.
//! 4. A stalled remove half of an update issues no add and keeps the old
//!    record in the snapshot.
//! 5. A stalled removal keeps the account in the snapshot until it succeeds.

use std::time::{Duration, Instant};

use anyhow::Result;
use usync_control::uplink_counter;
use usync_runtime::{CounterDirection, MutationOp};
use usync_schemas::TrafficSample;
use usync_testkit::{panel_account, Call, Harness};

#[tokio::test]
async fn stalled_add_times_out_without_blocking_others() -> Result<()> {
    let h = Harness::with_stalls(vec![panel_account(1001, "a"), panel_account(1002, "b")]);
    h.control.stall("1001", true);
    h.control.set_traffic("1002", 0, 4_000);

    let report = h.cycle().await?;

    assert_eq!(report.added, vec!["1002"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].op, MutationOp::Add);
    assert!(report.failed[0].error.contains("timed out"), "{}", report.failed[0].error);
    assert!(!h.store.applied().contains("1001"));

    // Both counter reads for the stalled account timed out as well.
    assert_eq!(report.counter_failures.len(), 2);
    assert_eq!(report.settled.len(), 1);

    h.control.stall("1001", false);
    let report = h.cycle().await?;
    assert_eq!(report.added, vec!["1001"]);
    assert!(report.is_clean());
    Ok(())
}

#[tokio::test]
async fn stalled_counter_read_counts_as_zero_for_that_direction() -> Result<()> {
    let h = Harness::with_stalls(vec![panel_account(1001, "a"), panel_account(1002, "b")]);
    h.cycle().await?;

    h.control.set_traffic("1001", 5_000, 7_000);
    h.control.set_traffic("1002", 0, 4_000);
    h.control.stall_counter(&uplink_counter("1001"), true);

    let started = Instant::now();
    let report = h.cycle().await?;
    assert!(started.elapsed() < Duration::from_millis(400), "{:?}", started.elapsed());

    assert_eq!(report.counter_failures.len(), 1);
    let failure = &report.counter_failures[0];
    assert_eq!(failure.email, "1001");
    assert_eq!(failure.direction, CounterDirection::Uplink);
    assert!(failure.error.contains("timed out"), "{}", failure.error);

    assert_eq!(h.ledger.total_for("1001"), TrafficSample::new(5_000, 0));
    assert_eq!(h.ledger.total_for("1002"), TrafficSample::new(0, 4_000));

    // The abandoned read never reset the counter; it settles next time.
    h.control.stall_counter(&uplink_counter("1001"), false);
    let report = h.cycle().await?;
    assert!(report.is_clean());
    assert_eq!(h.ledger.total_for("1001"), TrafficSample::new(5_000, 7_000));
    Ok(())
}

#[tokio::test]
async fn stalled_update_remove_issues_no_add_and_keeps_old_record() -> Result<()> {
    let h = Harness::with_stalls(vec![panel_account(1001, "a"), panel_account(1002, "b")]);
    h.cycle().await?;

    h.source
        .set_rows(vec![panel_account(1001, "z"), panel_account(1002, "b")]);
    h.control.stall("1001", true);
    h.control.clear_calls();

    let report = h.cycle().await?;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].email, "1001");
    assert_eq!(report.failed[0].op, MutationOp::UpdateRemove);
    assert!(report.failed[0].error.contains("timed out"), "{}", report.failed[0].error);
    assert!(report.updated.is_empty());
    assert_eq!(
        h.control.mutations(),
        vec![Call::Remove {
            email: "1001".to_string(),
            inbound_tag: "ssapi".to_string(),
        }]
    );

    let kept = h.store.applied();
    assert_eq!(kept.get("1001").map(|a| a.password.as_str()), Some("1001a"));
    assert_eq!(
        h.control.users().get("1001").map(|a| a.password.clone()),
        Some("1001a".to_string())
    );

    h.control.stall("1001", false);
    let report = h.cycle().await?;
    assert_eq!(report.updated, vec!["1001"]);
    assert_eq!(
        h.control.users().get("1001").map(|a| a.password.clone()),
        Some("1001z".to_string())
    );
    assert_eq!(
        h.store.applied().get("1001").map(|a| a.password.clone()),
        Some("1001z".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn stalled_removal_stays_applied_until_it_succeeds() -> Result<()> {
    let h = Harness::with_stalls(vec![panel_account(1001, "a"), panel_account(1002, "b")]);
    h.cycle().await?;

    h.source.set_rows(vec![panel_account(1002, "b")]);
    h.control.stall("1001", true);

    let report = h.cycle().await?;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].op, MutationOp::Remove);
    assert!(report.removed.is_empty());
    assert!(h.store.applied().contains("1001"));
    assert!(h.control.has_user("1001"));

    h.control.stall("1001", false);
    let report = h.cycle().await?;
    assert_eq!(report.removed, vec!["1001"]);
    assert!(!h.store.applied().contains("1001"));
    assert!(!h.control.has_user("1001"));
    Ok(())
}
