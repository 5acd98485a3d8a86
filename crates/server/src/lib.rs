//! Kubeflat server: runs one collection cycle per scrape and serves the result.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use kubeflat_core::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info};

pub mod exposition;

pub use exposition::encode_text;

/// The scrape boundary. Cycles never overlap: each holds `cycle` for its whole run.
pub struct Exporter {
    lister: Arc<dyn ResourceLister>,
    kinds: Vec<Kind>,
    cycle: Mutex<()>,
}

impl Exporter {
    pub fn new(lister: Arc<dyn ResourceLister>, kinds: Vec<Kind>) -> Self {
        Self { lister, kinds, cycle: Mutex::new(()) }
    }

    pub fn kinds(&self) -> &[Kind] { &self.kinds }

    pub async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let _guard = self.cycle.lock().await;
        collect_cycle(self.lister.as_ref(), &self.kinds).await
    }

    pub async fn render(&self) -> Result<String> {
        let families = self.collect().await?;
        encode_text(&families)
    }
}

pub fn router(exporter: Arc<Exporter>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(health))
        .with_state(exporter)
}

async fn metrics(State(exporter): State<Arc<Exporter>>) -> Response {
    match exporter.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = ?e, "scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("scrape failed: {:#}", e)).into_response()
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn serve(exporter: Arc<Exporter>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(addr = %addr, kinds = ?exporter.kinds(), "serving /metrics");
    axum::serve(listener, router(exporter))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received; shutting down");
    }
}
