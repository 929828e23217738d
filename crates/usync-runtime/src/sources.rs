//! Panel-database adapters for the runtime traits.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use usync_db::AccountProfile;
use usync_schemas::{Account, TrafficSample};

use crate::{DesiredSource, TrafficLedger};

#[derive(Clone, Debug)]
pub struct MySqlSource {
    pool: MySqlPool,
    profile: AccountProfile,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool, profile: AccountProfile) -> Self {
        Self { pool, profile }
    }
}

#[async_trait]
impl DesiredSource for MySqlSource {
    async fn enabled_accounts(&self) -> Result<Vec<Account>> {
        let rows = usync_db::fetch_enabled_users(&self.pool).await?;
        Ok(rows.iter().map(|r| r.to_account(&self.profile)).collect())
    }
}

#[async_trait]
impl TrafficLedger for MySqlSource {
    async fn add_traffic(&self, email: &str, sample: TrafficSample) -> Result<()> {
        let port = usync_db::port_from_email(email)?;
        let touched = usync_db::add_user_traffic(&self.pool, port, sample).await?;
        if touched == 0 {
            bail!("no panel row for port {port}");
        }
        Ok(())
    }
}
