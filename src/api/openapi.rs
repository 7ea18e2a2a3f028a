use crate::{
    api::handlers::{health, knock, plugin, root},
    plugin::Response,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(root::root, knock::knock, plugin::handler, health::health),
    components(schemas(health::Health, Response)),
    tags(
        (name = "knock", description = "TOTP knock flow"),
        (name = "plugin", description = "frps server plugin endpoint"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = Some(env!("CARGO_PKG_DESCRIPTION").to_string());
    doc
}
