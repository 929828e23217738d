//! Traffic settlement: drain both per-account counters with reset-after-read
//! and fold the result into the source of truth.
//!
//! Settlement is decoupled from membership: it runs for every desired
//! account whatever happened to that account's mutation this cycle. A counter
//! read failure counts as zero for the interval. A failed write loses the
//! sample (the counter is already reset) and is reported, not retried.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};
use usync_control::{downlink_counter, uplink_counter, ControlPlane, ControlPlaneError};
use usync_schemas::TrafficSample;

use crate::report::{CounterDirection, CounterFailure};
use crate::TrafficLedger;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Nothing above the noise floor; no write issued.
    BelowFloor,
    /// Written to the ledger.
    Written,
    /// Write failed; the sample is lost.
    Lost { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSettlement {
    pub email: String,
    pub sample: TrafficSample,
    pub outcome: SettlementOutcome,
    pub counter_failures: Vec<CounterFailure>,
}

pub struct TrafficSettlement<'a> {
    control: &'a dyn ControlPlane,
    ledger: &'a dyn TrafficLedger,
    call_timeout: Duration,
    noise_floor: i64,
}

impl<'a> TrafficSettlement<'a> {
    pub fn new(
        control: &'a dyn ControlPlane,
        ledger: &'a dyn TrafficLedger,
        call_timeout: Duration,
        noise_floor: i64,
    ) -> Self {
        Self {
            control,
            ledger,
            call_timeout,
            noise_floor,
        }
    }

    pub async fn settle(&self, email: &str) -> AccountSettlement {
        let mut counter_failures = Vec::new();

        let upload = self
            .drain(email, CounterDirection::Uplink, &mut counter_failures)
            .await;
        let download = self
            .drain(email, CounterDirection::Downlink, &mut counter_failures)
            .await;
        let sample = TrafficSample::new(download, upload);

        let outcome = if !sample.exceeds_noise_floor(self.noise_floor) {
            SettlementOutcome::BelowFloor
        } else {
            match self.ledger.add_traffic(email, sample).await {
                Ok(()) => {
                    info!(
                        email,
                        download = sample.download,
                        upload = sample.upload,
                        "traffic settled"
                    );
                    SettlementOutcome::Written
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    warn!(
                        email,
                        download = sample.download,
                        upload = sample.upload,
                        error = %error,
                        "traffic write failed; sample lost"
                    );
                    SettlementOutcome::Lost { error }
                }
            }
        };

        AccountSettlement {
            email: email.to_string(),
            sample,
            outcome,
            counter_failures,
        }
    }

    /// Read-and-reset one counter. Absent counter or failed read => 0.
    async fn drain(
        &self,
        email: &str,
        direction: CounterDirection,
        failures: &mut Vec<CounterFailure>,
    ) -> i64 {
        let name = match direction {
            CounterDirection::Uplink => uplink_counter(email),
            CounterDirection::Downlink => downlink_counter(email),
        };
        let res = bounded(
            "query_counter",
            self.call_timeout,
            self.control.query_counter(&name, true),
        )
        .await;
        match res {
            Ok(Some(v)) => v,
            Ok(None) => 0,
            Err(e) => {
                warn!(email, counter = %name, error = %e, "counter read failed; counted as zero");
                failures.push(CounterFailure {
                    email: email.to_string(),
                    direction,
                    error: e.to_string(),
                });
                0
            }
        }
    }
}

/// Run a control-plane call under `limit`; expiry is a call failure.
pub(crate) async fn bounded<T, F>(
    op: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, ControlPlaneError>
where
    F: Future<Output = Result<T, ControlPlaneError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(ControlPlaneError::Timeout {
            op,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
