use shared::error::CommonError;
use tracing::{error, info};

use crate::config::{ServeParams, build_service};
use crate::server::{StartAxumServerParams, start_axum_server};

pub async fn cmd_serve(params: ServeParams) -> Result<(), CommonError> {
    let service = build_service(&params)?;

    let (server_fut, _handle, addr) = start_axum_server(StartAxumServerParams {
        host: params.host.clone(),
        port: params.port,
        service,
    })
    .await?;
    info!(%addr, "Relay listening, point Slack's event and slash command URLs at /");

    if let Err(e) = server_fut.await {
        error!(error = %e, "Server stopped with an error");
        return Err(CommonError::IoError { source: e });
    }

    info!("Relay shut down");
    Ok(())
}
