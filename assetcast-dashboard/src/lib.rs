//! AssetCast Dashboard — actual vs predicted closes on one page.
//!
//! [`launch`] binds the port on the calling thread, then serves two routes
//! from a background thread running its own Tokio runtime:
//!
//! - `/`         HTML page with an inline SVG chart and the forecast text
//! - `/api/data` the same [`DashboardData`] as JSON
//!
//! The returned [`DashboardHandle`] stops the server.

pub mod chart;

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;

use assetcast_core::domain::PredictionRecord;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

pub use chart::{escape_html, render_chart};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("cannot bind dashboard to 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("dashboard I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dashboard server thread panicked")]
    ServerPanicked,
}

/// Everything the page shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub ticker: String,
    pub currency_symbol: String,
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub forecast: f64,
    /// Annualized volatility in percent.
    pub volatility: f64,
    pub description: String,
}

impl DashboardData {
    pub fn from_records(
        ticker: impl Into<String>,
        currency_symbol: impl Into<String>,
        records: &[PredictionRecord],
        forecast: f64,
        volatility: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            currency_symbol: currency_symbol.into(),
            dates: records.iter().map(|r| r.date).collect(),
            actual: records.iter().map(|r| r.actual_close).collect(),
            predicted: records.iter().map(|r| r.predicted_close).collect(),
            forecast,
            volatility,
            description: description.into(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} price prediction", self.ticker)
    }
}

/// Full HTML document for `data`. Pure; the server calls it per request.
pub fn render_page(data: &DashboardData) -> String {
    let title = escape_html(&data.title());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem auto; max-width: 1000px; color: #222; }}
h1 {{ text-align: center; font-weight: 500; }}
p.description {{ font-size: 1.1rem; line-height: 1.5; }}
.legend span {{ margin-right: 1.5rem; }}
.actual {{ color: #1f77b4; }}
.predicted {{ color: #ff7f0e; }}
</style>
</head>
<body>
<h1>{title}</h1>
<div class="legend"><span class="actual">&#9632; Real values</span><span class="predicted">&#9632; Predicted values</span></div>
{chart}
<p class="description">{description}</p>
</body>
</html>
"#,
        chart = render_chart(data),
        description = escape_html(&data.description),
    )
}

fn router(data: Arc<DashboardData>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/data", get(api_data))
        .with_state(data)
}

async fn index(State(data): State<Arc<DashboardData>>) -> Html<String> {
    debug!("serving dashboard page");
    Html(render_page(&data))
}

async fn api_data(State(data): State<Arc<DashboardData>>) -> Json<DashboardData> {
    Json(DashboardData::clone(&data))
}

/// A running dashboard server.
///
/// Dropping the handle signals shutdown without waiting for the thread.
pub struct DashboardHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<Result<(), DashboardError>>>,
}

impl DashboardHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Stop accepting connections, finish in-flight requests, join the thread.
    pub fn shutdown(mut self) -> Result<(), DashboardError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join()
    }

    /// Block until the server stops on its own (process interrupt or I/O failure).
    pub fn wait(mut self) -> Result<(), DashboardError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), DashboardError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| DashboardError::ServerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Serve `data` on `127.0.0.1:port` (`0` picks a free port).
///
/// Bind errors are returned here, before any thread is spawned.
pub fn launch(data: DashboardData, port: u16) -> Result<DashboardHandle, DashboardError> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|source| DashboardError::Bind { port, source })?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let app = router(Arc::new(data));
    let (tx, rx) = oneshot::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("assetcast-dashboard".into())
        .spawn(move || -> Result<(), DashboardError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await
            })?;
            debug!("dashboard server stopped");
            Ok(())
        })?;

    info!(%addr, "dashboard listening");
    Ok(DashboardHandle {
        addr,
        shutdown: Some(tx),
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DashboardData {
        let records: Vec<PredictionRecord> = (1..=3)
            .map(|d| PredictionRecord {
                date: NaiveDate::from_ymd_opt(2024, 4, d).unwrap(),
                actual_close: 100.0 + d as f64,
                predicted_close: 101.0 + d as f64,
                difference: 1.0,
                percent_difference: 1.0,
            })
            .collect();
        DashboardData::from_records(
            "BTC-USD",
            "$",
            &records,
            105.0,
            48.5,
            "Forecast <b>up</b> & away",
        )
    }

    #[test]
    fn from_records_keeps_order() {
        let data = sample();
        assert_eq!(data.dates.len(), 3);
        assert_eq!(data.actual, vec![101.0, 102.0, 103.0]);
        assert_eq!(data.predicted, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn page_escapes_description_and_embeds_chart() {
        let html = render_page(&sample());
        assert!(html.contains("<title>BTC-USD price prediction</title>"));
        assert!(html.contains("Forecast &lt;b&gt;up&lt;/b&gt; &amp; away"));
        assert!(!html.contains("<b>up</b>"));
        assert!(html.contains("<svg"));
    }

    #[test]
    fn bind_conflict_surfaces_immediately() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = launch(sample(), port).err().unwrap();
        assert!(matches!(err, DashboardError::Bind { port: p, .. } if p == port));
    }
}
