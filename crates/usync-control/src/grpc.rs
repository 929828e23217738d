//! gRPC transport to the Xray API listener.
//!
//! One long-lived [`Channel`] is shared by every call; tonic reconnects it
//! underneath when the proxy restarts. Connection failure at construction is
//! reported to the caller, which treats it as fatal at startup.

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;
use usync_config::ControlPlaneSettings;
use usync_schemas::Account;

use crate::proto::{
    self, AlterInboundResponse, CipherType, QueryStatsRequest, QueryStatsResponse,
    ALTER_INBOUND_PATH, QUERY_STATS_PATH,
};
use crate::{ControlPlane, ControlPlaneError};

#[derive(Clone, Debug)]
pub struct XrayClient {
    channel: Channel,
    cipher: CipherType,
}

impl XrayClient {
    /// Dial the API listener eagerly.
    pub async fn connect(settings: &ControlPlaneSettings) -> Result<Self, ControlPlaneError> {
        let uri = settings.endpoint_uri();
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ControlPlaneError::InvalidArgument(format!("{uri}: {e}")))?
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.call_timeout());

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("connect {uri}: {e}")))?;

        Ok(Self::from_channel(channel, settings.cipher.into()))
    }

    pub fn from_channel(channel: Channel, cipher: CipherType) -> Self {
        Self { channel, cipher }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, req: Req) -> Result<Resp, ControlPlaneError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("service was not ready: {e}")))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let resp = grpc
            .unary(
                tonic::Request::new(req),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(resp.into_inner())
    }
}

#[async_trait]
impl ControlPlane for XrayClient {
    async fn add_account(&self, account: &Account) -> Result<(), ControlPlaneError> {
        debug!(email = %account.email, inbound = %account.inbound_tag, "AlterInbound add");
        let req = proto::add_user_request(account, self.cipher);
        let _: AlterInboundResponse = self.unary(ALTER_INBOUND_PATH, req).await?;
        Ok(())
    }

    async fn remove_account(&self, email: &str, inbound_tag: &str) -> Result<(), ControlPlaneError> {
        debug!(email, inbound = inbound_tag, "AlterInbound remove");
        let req = proto::remove_user_request(email, inbound_tag);
        let _: AlterInboundResponse = self.unary(ALTER_INBOUND_PATH, req).await?;
        Ok(())
    }

    async fn query_counter(&self, name: &str, reset: bool) -> Result<Option<i64>, ControlPlaneError> {
        let req = QueryStatsRequest {
            pattern: name.to_string(),
            reset,
        };
        let resp: QueryStatsResponse = self.unary(QUERY_STATS_PATH, req).await?;
        Ok(proto::select_counter(&resp, name))
    }
}
