//! Panel database access.
//!
//! The panel owns the `user` table; usync only reads enabled rows and adds
//! traffic increments to the `u`/`d` counters. Every write is its own
//! statement; no transaction spans a reconcile cycle.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use usync_schemas::TrafficSample;

mod users;

pub use users::{derive_password, port_from_email, AccountProfile, UserRow};

/// Env var the DB-backed tests read their connection URL from.
pub const ENV_DB_URL: &str = "USYNC_DATABASE_URL";

/// Connect a pool. Failure here is fatal for the daemon.
pub async fn connect(url: &str, max_connections: u32) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .context("failed to connect to MySQL")?;
    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_user_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &MySqlPool) -> Result<DbStatus> {
    let (one,): (i64,) = sqlx::query_as::<_, (i64,)>("SELECT CAST(1 AS SIGNED)")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT CAST(COUNT(*) AS SIGNED)
        FROM information_schema.tables
        WHERE table_schema = DATABASE() AND table_name = 'user'
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_user_table: n > 0,
    })
}

/// All enabled users, in table order.
pub async fn fetch_enabled_users(pool: &MySqlPool) -> Result<Vec<UserRow>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT CAST(port AS SIGNED), COALESCE(passwd, '')
        FROM `user`
        WHERE enable = 1
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_enabled_users failed")?;

    Ok(rows
        .into_iter()
        .map(|(port, passwd)| UserRow { port, passwd })
        .collect())
}

/// Add `sample` to the cumulative counters of the user on `port`.
///
/// Returns the number of rows touched; 0 means the row vanished between the
/// read and the write. The noise-floor gate is the caller's decision.
pub async fn add_user_traffic(pool: &MySqlPool, port: i64, sample: TrafficSample) -> Result<u64> {
    let res = sqlx::query("UPDATE `user` SET d = d + ?, u = u + ? WHERE port = ?")
        .bind(sample.download)
        .bind(sample.upload)
        .bind(port)
        .execute(pool)
        .await
        .with_context(|| format!("add_user_traffic failed for port {port}"))?;
    Ok(res.rows_affected())
}
