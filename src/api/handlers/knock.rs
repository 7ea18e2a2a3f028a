use crate::{
    knock::{knock as run_knock, KnockOutcome},
    registry::{unix_now, Registry},
};
use axum::{
    extract::{ConnectInfo, Extension, Form, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{Local, TimeZone};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, instrument};
use utoipa::IntoParams;

const CHALLENGE_FORM: &str = "<form method='POST'><input type='text' id='code' name='code' autocomplete='one-time-code' inputmode='numeric' /><input type='submit' value='Submit' /></form>";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KnockQuery {
    /// Channel (proxy name) to unlock
    #[serde(default)]
    channel: String,
    /// Passcode, used when the form body has none
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KnockForm {
    #[serde(default)]
    code: Option<String>,
}

fn challenge_page(notice: &str) -> String {
    format!(
        "<html><head><title>Authorization code required</title></head><body>{notice}<p>Please enter your authorization code:</p>{CHALLENGE_FORM}</body></html>"
    )
}

fn success_page() -> String {
    "<html><head><title>Verified</title></head><body><p>Verification succeeded, please connect within five minutes.</p></body></html>".to_string()
}

fn format_unix(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map_or_else(|| ts.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[utoipa::path(
    post,
    path = "/knock",
    params(KnockQuery),
    request_body(content = String, description = "Form field `code` with the TOTP passcode", content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "Challenge form or success page", body = String, content_type = "text/html"),
        (status = 403, description = "Source IP blocked, or unknown channel while enforcing", body = String, content_type = "text/plain"),
    ),
    tag = "knock"
)]
// axum handler for knock, serves GET and POST
#[instrument(skip_all, fields(channel = %query.channel, peer = %peer))]
pub async fn knock(
    registry: Extension<Arc<Registry>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<KnockQuery>,
    form: Option<Form<KnockForm>>,
) -> Response {
    let Some(channel) = registry.get(&query.channel) else {
        debug!("knock on unknown channel");

        return if registry.enforce() {
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        } else {
            (StatusCode::OK, "Ok").into_response()
        };
    };

    let ip = peer.ip().to_canonical().to_string();
    let code = form
        .and_then(|Form(form)| form.code)
        .filter(|code| !code.is_empty())
        .or(query.code);

    match run_knock(channel, &ip, code.as_deref(), unix_now()) {
        KnockOutcome::Challenge => (StatusCode::OK, Html(challenge_page(""))).into_response(),
        KnockOutcome::Rejected { .. } => (
            StatusCode::OK,
            Html(challenge_page("<p>Invalid authorization code.</p>")),
        )
            .into_response(),
        KnockOutcome::Granted { .. } => (StatusCode::OK, Html(success_page())).into_response(),
        KnockOutcome::Blocked { blocked_until } => (
            StatusCode::FORBIDDEN,
            format!(
                "Your IP {ip} has been blocked automatically, please retry after {}",
                format_unix(blocked_until)
            ),
        )
            .into_response(),
        KnockOutcome::Blacklisted => (
            StatusCode::FORBIDDEN,
            format!("Your IP {ip} is blacklisted, please contact the administrator"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_contain_form() {
        assert!(challenge_page("").contains("name='code'"));
        assert!(challenge_page("<p>bad</p>").contains("<p>bad</p>"));
        assert!(!success_page().contains("<form"));
    }

    #[test]
    fn unix_time_is_human_readable() {
        let formatted = format_unix(1_700_000_000);
        assert_eq!(formatted.len(), "2023-11-14 22:13:20".len());
        assert!(formatted.starts_with("2023-11-1"));
    }
}
