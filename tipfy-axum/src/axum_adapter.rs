use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, body::Body, http::Request, http::StatusCode, response::IntoResponse};
use tipfy::Tipfy;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::AxumRouteAdapter;
use super::axum_route_adapter::DEFAULT_BODY_LIMIT;

/// Serves a [`Tipfy`] application with axum.
///
/// The application does its own routing, so every request goes through a
/// single fallback route.
#[derive(Clone)]
pub struct AxumAdapter {
    app: Arc<Tipfy>,
    body_limit: usize,
}

impl AxumAdapter {
    /// Runs the `pre_run_app` hooks of `app` and wraps it.
    pub fn new(app: Tipfy) -> Self {
        Self {
            app: Arc::new(app.prepare_run()),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Largest request body accepted, in bytes. Longer bodies get a 413.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn app(&self) -> &Tipfy {
        &self.app
    }

    pub fn router(&self) -> Router {
        let app = self.app.clone();
        let body_limit = self.body_limit;
        Router::new().fallback(move |req: Request<Body>| {
            let app = app.clone();
            async move {
                match AxumRouteAdapter::handle_request_with_limit(req, app, body_limit).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(error = ?e, "failed to serve request");
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
        })
    }

    pub async fn listen(self, port: u16, hostname: &str) -> Result<()> {
        let addr = format!("{}:{}", hostname, port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!(%addr, debug = self.app.debug(), "listening");

        axum::serve(listener, self.router())
            .await
            .with_context(|| "Axum server encountered an error")?;
        Ok(())
    }
}
