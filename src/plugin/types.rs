//! frp server-plugin wire types.
//!
//! Only the fields the dispatcher reads are named; everything else in a
//! content object is kept in `extra` so accepted content is echoed back as sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Login,
    NewProxy,
    CloseProxy,
    Ping,
    NewWorkConn,
    NewUserConn,
}

impl Op {
    pub const ALL: [Self; 6] = [
        Self::Login,
        Self::NewProxy,
        Self::CloseProxy,
        Self::Ping,
        Self::NewWorkConn,
        Self::NewUserConn,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::NewProxy => "NewProxy",
            Self::CloseProxy => "CloseProxy",
            Self::Ping => "Ping",
            Self::NewWorkConn => "NewWorkConn",
            Self::NewUserConn => "NewUserConn",
        }
    }

    /// Match an operation name exactly as frp spells it.
    #[must_use]
    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().as_bytes() == name)
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request envelope posted by frps.
#[derive(Debug, Deserialize)]
pub struct Request<C> {
    #[serde(default)]
    pub version: String,
    /// Empty when the op was sent under a differently-cased key.
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub content: C,
}

/// Plugin reply; frps reads the decision from the body, never the status code.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Response {
    pub reject: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub unchange: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
}

impl Response {
    /// Let the operation through untouched.
    #[must_use]
    pub fn accept() -> Self {
        Self {
            unchange: true,
            ..Self::default()
        }
    }

    /// Let the operation through, echoing `content` back to frps.
    #[must_use]
    pub fn accept_with<C: Serialize>(content: &C) -> Self {
        Self {
            unchange: true,
            content: serde_json::to_value(content).ok(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            reject: true,
            reject_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginContent {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProxyContent {
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub proxy_name: String,
    #[serde(default)]
    pub proxy_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseProxyContent {
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub proxy_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PingContent {
    #[serde(default)]
    pub user: UserInfo,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkConnContent {
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub run_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUserConnContent {
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub proxy_name: String,
    #[serde(default)]
    pub proxy_type: String,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewUserConnContent {
    /// Host part of `remote_addr` (`ip:port` or `[ipv6]:port`).
    #[must_use]
    pub fn remote_ip(&self) -> &str {
        split_host(&self.remote_addr)
    }
}

/// Strip the port from a `host:port` pair; bare IPv6 addresses are kept whole.
#[must_use]
pub fn split_host(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }

    match address.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host,
        _ => address,
    }
}
