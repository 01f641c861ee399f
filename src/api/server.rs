use std::sync::Arc;

use error_stack::Report;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::post;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio::sync::oneshot;
use tracing::{error, info};

use super::errors::ApiError;
use super::handlers::{request_backup, request_scale_up, AppContext};

/// HTTP server for the two control-plane operations.
pub struct ApiServer {
    context: Arc<AppContext>,
    listen_addr: String,
}

/// Route table, shared with the handler tests.
pub fn build_route(context: Arc<AppContext>) -> impl poem::Endpoint {
    Route::new()
        .at("/api/v1/backups", post(request_backup))
        .at("/api/v1/scale-up", post(request_scale_up))
        .data(context)
        .with(Tracing)
}

impl ApiServer {
    pub fn new(context: Arc<AppContext>, listen_addr: String) -> Self {
        Self {
            context,
            listen_addr,
        }
    }

    /// Run until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind
    pub async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<(), Report<ApiError>> {
        info!("Starting control-plane API on {}", self.listen_addr);

        let app = build_route(self.context);
        let listener = TcpListener::bind(&self.listen_addr);
        let server = Server::new(listener);

        tokio::select! {
            result = server.run(app) => {
                match result {
                    Ok(()) => {
                        info!("API server stopped normally");
                        Ok(())
                    }
                    Err(e) => {
                        error!("API server failed: {e}");
                        Err(Report::new(ApiError::ServerError {
                            message: format!("Server failed: {e}"),
                        }))
                    }
                }
            }
            _ = &mut shutdown_rx => {
                info!("API server shutdown requested");
                Ok(())
            }
        }
    }
}
