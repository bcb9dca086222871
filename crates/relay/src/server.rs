use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use group_sync::RelayService;
use group_sync::router::create_router;
use shared::error::CommonError;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

pub struct StartAxumServerParams {
    pub host: String,
    pub port: u16,
    pub service: RelayService,
}

pub fn build_router(service: RelayService) -> Router {
    let (router, _) = create_router().split_for_parts();
    router
        .with_state(Arc::new(service))
        .layer(TraceLayer::new_for_http())
}

/// Starts the Axum server
///
/// The returned future resolves once the server has drained after Ctrl+C.
pub async fn start_axum_server(
    params: StartAxumServerParams,
) -> Result<
    (
        impl Future<Output = Result<(), std::io::Error>>,
        axum_server::Handle,
        SocketAddr,
    ),
    CommonError,
> {
    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .map_err(|e| CommonError::AddrParseError { source: e })?;

    info!(%addr, "Starting server");

    let handle = axum_server::Handle::new();
    let router = build_router(params.service);

    let server_fut = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(router.into_make_service());

    let handle_clone = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }

        info!("Shutting down axum server, waiting for in-flight requests to complete...");
        handle_clone.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
    });

    Ok((server_fut, handle, addr))
}
