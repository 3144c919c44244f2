//! Prometheus-kompatible Metriken fuer doorhub
//!
//! Registrierte Metriken:
//! - `doorhub_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `doorhub_events_total` – Counter: Geroutete Ereignisse (kind)
//! - `doorhub_events_dropped_total` – Counter: Verworfene Nachrichten (reason)
//! - `doorhub_delivery_failures_total` – Counter: Fehlgeschlagene Zustellungen
//! - `doorhub_broadcast_duration_seconds` – Histogram: Dauer eines Broadcasts
//! - `doorhub_http_requests_total` – Counter: HTTP-Anfragen (method, path als Routen-Muster, status)

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle doorhub-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metriken.
#[derive(Clone)]
pub struct DoorhubMetrics {
    pub registry: Arc<Registry>,

    // Relay-Metriken
    pub connected_clients: Gauge,
    pub events_total: IntCounterVec,
    pub events_dropped_total: IntCounterVec,
    pub delivery_failures_total: IntCounter,
    pub broadcast_duration_seconds: Histogram,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
}

impl DoorhubMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = Gauge::with_opts(Opts::new(
            "doorhub_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("doorhub_events_total", "Gesamtanzahl gerouteter Ereignisse"),
            &["kind"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let events_dropped_total = IntCounterVec::new(
            Opts::new(
                "doorhub_events_dropped_total",
                "Verworfene Nachrichten nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let delivery_failures_total = IntCounter::with_opts(Opts::new(
            "doorhub_delivery_failures_total",
            "Fehlgeschlagene Zustellungen an Beobachter",
        ))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;

        let broadcast_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "doorhub_broadcast_duration_seconds",
                "Dauer eines Broadcasts in Sekunden",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(broadcast_duration_seconds.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("doorhub_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            events_total,
            events_dropped_total,
            delivery_failures_total,
            broadcast_duration_seconds,
            http_requests_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: DoorhubMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<DoorhubMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
