//! Wire messages for the Xray `HandlerService` and `StatsService`.
//!
//! Only the fields usync sends or reads are declared; protobuf ignores the
//! rest. Field numbers and full message names must match the server's
//! `.proto` definitions exactly, since operations travel as `TypedMessage`
//! values keyed by full name.

use prost::Message;
use usync_config::Cipher;
use usync_schemas::Account;

pub const ALTER_INBOUND_PATH: &str = "/xray.app.proxyman.command.HandlerService/AlterInbound";
pub const QUERY_STATS_PATH: &str = "/xray.app.stats.command.StatsService/QueryStats";

/// Message types that can be wrapped in a [`TypedMessage`].
pub trait Named: Message + Sized {
    /// Fully-qualified protobuf name.
    const FULL_NAME: &'static str;

    fn to_typed(&self) -> TypedMessage {
        TypedMessage {
            r#type: Self::FULL_NAME.to_string(),
            value: self.encode_to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// xray.common.serial
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct TypedMessage {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

// ---------------------------------------------------------------------------
// xray.common.protocol
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct User {
    #[prost(uint32, tag = "1")]
    pub level: u32,
    #[prost(string, tag = "2")]
    pub email: String,
    #[prost(message, optional, tag = "3")]
    pub account: Option<TypedMessage>,
}

// ---------------------------------------------------------------------------
// xray.proxy.shadowsocks
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CipherType {
    Unknown = 0,
    Aes128Gcm = 5,
    Aes256Gcm = 6,
    Chacha20Poly1305 = 7,
    Xchacha20Poly1305 = 8,
}

impl From<Cipher> for CipherType {
    fn from(c: Cipher) -> Self {
        match c {
            Cipher::Aes128Gcm => CipherType::Aes128Gcm,
            Cipher::Aes256Gcm => CipherType::Aes256Gcm,
            Cipher::Chacha20Poly1305 => CipherType::Chacha20Poly1305,
            Cipher::Xchacha20Poly1305 => CipherType::Xchacha20Poly1305,
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ShadowsocksAccount {
    #[prost(string, tag = "1")]
    pub password: String,
    #[prost(enumeration = "CipherType", tag = "2")]
    pub cipher_type: i32,
}

impl Named for ShadowsocksAccount {
    const FULL_NAME: &'static str = "xray.proxy.shadowsocks.Account";
}

// ---------------------------------------------------------------------------
// xray.app.proxyman.command
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct AddUserOperation {
    #[prost(message, optional, tag = "1")]
    pub user: Option<User>,
}

impl Named for AddUserOperation {
    const FULL_NAME: &'static str = "xray.app.proxyman.command.AddUserOperation";
}

#[derive(Clone, PartialEq, Message)]
pub struct RemoveUserOperation {
    #[prost(string, tag = "1")]
    pub email: String,
}

impl Named for RemoveUserOperation {
    const FULL_NAME: &'static str = "xray.app.proxyman.command.RemoveUserOperation";
}

#[derive(Clone, PartialEq, Message)]
pub struct AlterInboundRequest {
    #[prost(string, tag = "1")]
    pub tag: String,
    #[prost(message, optional, tag = "2")]
    pub operation: Option<TypedMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AlterInboundResponse {}

// ---------------------------------------------------------------------------
// xray.app.stats.command
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct QueryStatsRequest {
    #[prost(string, tag = "1")]
    pub pattern: String,
    #[prost(bool, tag = "2")]
    pub reset: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct Stat {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub value: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryStatsResponse {
    #[prost(message, repeated, tag = "1")]
    pub stat: Vec<Stat>,
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

pub fn add_user_request(account: &Account, cipher: CipherType) -> AlterInboundRequest {
    let ss = ShadowsocksAccount {
        password: account.password.clone(),
        cipher_type: cipher as i32,
    };
    let op = AddUserOperation {
        user: Some(User {
            level: account.level,
            email: account.email.clone(),
            account: Some(ss.to_typed()),
        }),
    };
    AlterInboundRequest {
        tag: account.inbound_tag.clone(),
        operation: Some(op.to_typed()),
    }
}

pub fn remove_user_request(email: &str, inbound_tag: &str) -> AlterInboundRequest {
    let op = RemoveUserOperation {
        email: email.to_string(),
    };
    AlterInboundRequest {
        tag: inbound_tag.to_string(),
        operation: Some(op.to_typed()),
    }
}

/// The pattern query is a substring match; only an exact name counts.
pub fn select_counter(resp: &QueryStatsResponse, name: &str) -> Option<i64> {
    resp.stat.iter().find(|s| s.name == name).map(|s| s.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_wraps_user_and_shadowsocks_account() {
        let acct = Account::new("10086", 0, "ssapi", "10086abc");
        let req = add_user_request(&acct, CipherType::Aes128Gcm);
        assert_eq!(req.tag, "ssapi");

        let op_msg = req.operation.expect("operation");
        assert_eq!(op_msg.r#type, "xray.app.proxyman.command.AddUserOperation");
        let op = AddUserOperation::decode(op_msg.value.as_slice()).unwrap();
        let user = op.user.expect("user");
        assert_eq!(user.email, "10086");
        assert_eq!(user.level, 0);

        let account_msg = user.account.expect("account");
        assert_eq!(account_msg.r#type, "xray.proxy.shadowsocks.Account");
        let ss = ShadowsocksAccount::decode(account_msg.value.as_slice()).unwrap();
        assert_eq!(ss.password, "10086abc");
        assert_eq!(ss.cipher_type, CipherType::Aes128Gcm as i32);
    }

    #[test]
    fn remove_request_carries_email_and_tag() {
        let req = remove_user_request("10086", "ssapi");
        assert_eq!(req.tag, "ssapi");
        let op_msg = req.operation.expect("operation");
        assert_eq!(op_msg.r#type, "xray.app.proxyman.command.RemoveUserOperation");
        let op = RemoveUserOperation::decode(op_msg.value.as_slice()).unwrap();
        assert_eq!(op.email, "10086");
    }

    #[test]
    fn select_counter_requires_exact_name() {
        let resp = QueryStatsResponse {
            stat: vec![
                Stat {
                    name: "user>>>110>>>traffic>>>uplink".to_string(),
                    value: 7,
                },
                Stat {
                    name: "user>>>10>>>traffic>>>uplink".to_string(),
                    value: 42,
                },
            ],
        };
        assert_eq!(select_counter(&resp, "user>>>10>>>traffic>>>uplink"), Some(42));
        assert_eq!(select_counter(&resp, "user>>>11>>>traffic>>>uplink"), None);
        assert_eq!(select_counter(&QueryStatsResponse::default(), "x"), None);
    }

    #[test]
    fn config_cipher_maps_to_wire_enum() {
        assert_eq!(CipherType::from(Cipher::Aes128Gcm) as i32, 5);
        assert_eq!(CipherType::from(Cipher::Chacha20Poly1305) as i32, 7);
    }
}
