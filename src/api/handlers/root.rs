use axum::response::{Html, IntoResponse};

#[utoipa::path(
    get,
    path = "/",
    responses (
        (status = 200, description = "Informational page", body = String, content_type = "text/html"),
    ),
    tag = "knock"
)]
// axum handler for root
pub async fn root() -> impl IntoResponse {
    Html(concat!(
        "<html><head><title>",
        env!("CARGO_PKG_NAME"),
        "</title></head><body><p>Access authorization service. Open <code>/knock?channel=&lt;name&gt;</code> to unlock a channel.</p></body></html>"
    ))
}
