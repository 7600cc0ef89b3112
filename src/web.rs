use std::net::SocketAddr;
use std::sync::Arc;

use crate::authz::{self, Otter};
use crate::errors::OtterError;
use crate::settings::Settings;

/// Bind the configured address and serve the authorization API until the
/// process is stopped.
pub async fn serve(settings: &Settings, otter: Arc<Otter>) -> Result<(), OtterError> {
    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|_| OtterError::BadAddr(settings.listen_addr()))?;

    let router = authz::web::router(otter);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Authorization API listening");
    axum::serve(listener, router).await?;
    Ok(())
}
