//! frp server-plugin dispatcher.
//!
//! A request is first classified by [`classify::scan_op`] on the raw body;
//! only a recognised operation gets a typed decode of its content.

pub mod classify;
pub mod types;

use crate::{
    config::AccessModel,
    registry::{Channel, Registry},
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

pub use types::{
    CloseProxyContent, LoginContent, NewProxyContent, NewUserConnContent, NewWorkConnContent, Op,
    PingContent, Request, Response,
};

pub const REASON_UNKNOWN_OPERATION: &str = "unknown operation";
pub const REASON_NOT_ENABLED: &str = "proxy is not enable";
pub const REASON_NOT_CONFIGURED: &str = "proxy is not config";
pub const REASON_NOT_ALLOWED: &str = "user ip not in allow Whitelist";

/// Decide a raw plugin request body at unix time `now`.
#[instrument(skip(registry, body), fields(len = body.len()))]
pub fn dispatch(registry: &Registry, body: &[u8], now: i64) -> Response {
    let Some(op) = classify::scan_op(body).and_then(Op::from_bytes) else {
        debug!("rejecting request without a known op");
        return Response::reject(REASON_UNKNOWN_OPERATION);
    };

    let response = match op {
        Op::Ping => decode::<PingContent>(op, body).map(|_| Response::accept()),
        Op::Login => decode::<LoginContent>(op, body).map(|_| Response::accept()),
        Op::CloseProxy => decode::<CloseProxyContent>(op, body).map(|_| Response::accept()),
        Op::NewWorkConn => decode::<NewWorkConnContent>(op, body).map(|_| Response::accept()),
        Op::NewProxy => {
            decode::<NewProxyContent>(op, body).map(|content| new_proxy(registry, &content))
        }
        Op::NewUserConn => decode::<NewUserConnContent>(op, body)
            .map(|content| new_user_conn(registry, &content, now)),
    };

    let response = response.unwrap_or_else(|reason| Response::reject(reason));

    if response.reject {
        debug!(
            "{} rejected: {}",
            op,
            response.reject_reason.as_deref().unwrap_or_default()
        );
    }

    response
}

fn decode<C: DeserializeOwned + Default>(op: Op, body: &[u8]) -> Result<C, String> {
    let request: Request<C> =
        serde_json::from_slice(body).map_err(|e| format!("parse request error: {e}"))?;

    // the op may sit under a key serde doesn't match ("Op", "OP")
    if !request.op.is_empty() && request.op != op.as_str() {
        return Err(format!(
            "parse request error: op {:?} does not match {}",
            request.op, op
        ));
    }

    Ok(request.content)
}

/// Resolve `proxy_name` for operations gated by channel state.
///
/// `Ok(None)` means the channel is unknown and `enforce` is off.
fn enabled_channel<'a>(
    registry: &'a Registry,
    proxy_name: &str,
) -> Result<Option<&'a Channel>, Response> {
    match registry.get(proxy_name) {
        Some(channel) if channel.enabled() => Ok(Some(channel)),
        Some(_) => Err(Response::reject(REASON_NOT_ENABLED)),
        None if registry.enforce() => Err(Response::reject(REASON_NOT_CONFIGURED)),
        None => Ok(None),
    }
}

fn new_proxy(registry: &Registry, content: &NewProxyContent) -> Response {
    match enabled_channel(registry, &content.proxy_name) {
        Ok(_) => Response::accept_with(content),
        Err(rejection) => rejection,
    }
}

fn new_user_conn(registry: &Registry, content: &NewUserConnContent, now: i64) -> Response {
    let channel = match enabled_channel(registry, &content.proxy_name) {
        Ok(Some(channel)) => channel,
        Ok(None) => return Response::accept_with(content),
        Err(rejection) => return rejection,
    };

    if channel.model() == AccessModel::Bypass {
        return Response::accept_with(content);
    }

    if channel.ledger().is_allowed(content.remote_ip(), now) {
        Response::accept_with(content)
    } else {
        Response::reject(REASON_NOT_ALLOWED)
    }
}
