use crate::{
    plugin::{self, Response},
    registry::{unix_now, Registry},
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Extension},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    post,
    path = "/handler",
    request_body(content = String, description = "frp server plugin request", content_type = "application/json"),
    responses (
        (status = 200, description = "Plugin decision, rejections are reported in the body", body = Response, content_type = "application/json"),
    ),
    tag = "plugin"
)]
// axum handler for frps plugin calls
pub async fn handler(
    registry: Extension<Arc<Registry>>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let response = match body {
        Ok(body) => plugin::dispatch(&registry, &body, unix_now()),
        Err(e) => {
            error!("Failed to read plugin request body: {}", e);

            Response::reject(format!("read request body error: {e}"))
        }
    };

    Json(response)
}
