//! HTTP surface of the relay

mod webhook;

pub use webhook::{SERVICE_ROUTE_KEY, UrlVerificationResponse, create_router, route_slack_webhook};

use utoipa::openapi::OpenApi as OpenApiDoc;

/// OpenAPI document of the webhook endpoint
pub fn get_openapi_spec() -> OpenApiDoc {
    let (_, mut openapi) = create_router().split_for_parts();
    openapi.info.title = "slack-box-relay".to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi
}
