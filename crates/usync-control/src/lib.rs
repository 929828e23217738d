//! Control-plane boundary: the proxy's administrative API.
//!
//! [`ControlPlane`] is the only surface the reconciler sees. It covers the
//! two remote RPC families: inbound user mutation (add/remove) and named
//! traffic counters (read with optional reset). [`XrayClient`] is the
//! production implementation over gRPC; tests use in-memory fakes.

use std::fmt;

use async_trait::async_trait;
use usync_schemas::Account;

mod grpc;
pub mod proto;

pub use grpc::XrayClient;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`ControlPlane`] call may return. None of them is fatal for a
/// reconcile cycle; the caller isolates them per account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The connection could not be used (refused, reset, not ready).
    Transport(String),
    /// The remote side answered with a gRPC error status.
    Rpc { code: String, message: String },
    /// The call did not finish within its time bound.
    Timeout { op: &'static str, after_ms: u64 },
    /// The request could not be built (bad endpoint, bad argument).
    InvalidArgument(String),
}

impl fmt::Display for ControlPlaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlPlaneError::Transport(msg) => write!(f, "transport error: {msg}"),
            ControlPlaneError::Rpc { code, message } => {
                write!(f, "rpc error code={code}: {message}")
            }
            ControlPlaneError::Timeout { op, after_ms } => {
                write!(f, "{op} timed out after {after_ms}ms")
            }
            ControlPlaneError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for ControlPlaneError {}

impl From<tonic::Status> for ControlPlaneError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable => ControlPlaneError::Transport(status.message().to_string()),
            code => ControlPlaneError::Rpc {
                code: format!("{code:?}"),
                message: status.message().to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Control-plane trait
// ---------------------------------------------------------------------------

/// Remote account and counter administration.
///
/// The reconciler never relies on remote idempotency: it calls `add_account`
/// only for accounts its snapshot says are absent.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Attach `account` to its inbound with its credential and level.
    async fn add_account(&self, account: &Account) -> Result<(), ControlPlaneError>;

    /// Evict `email` from the inbound `inbound_tag`.
    async fn remove_account(&self, email: &str, inbound_tag: &str) -> Result<(), ControlPlaneError>;

    /// Read the counter called `name`, zeroing it server-side when `reset` is
    /// set. `Ok(None)` means the counter does not exist ("no data"), which the
    /// caller treats as zero activity.
    async fn query_counter(&self, name: &str, reset: bool) -> Result<Option<i64>, ControlPlaneError>;
}

// ---------------------------------------------------------------------------
// Counter naming
// ---------------------------------------------------------------------------

pub fn uplink_counter(email: &str) -> String {
    format!("user>>>{email}>>>traffic>>>uplink")
}

pub fn downlink_counter(email: &str) -> String {
    format!("user>>>{email}>>>traffic>>>downlink")
}
