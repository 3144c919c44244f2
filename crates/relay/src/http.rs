//! HTTP-Oberflaeche des Hubs
//!
//! - `GET /ws` – WebSocket fuer Dashboards
//! - alles andere – statische Dashboard-Dateien (`index.html` unter `/`)

use axum::{middleware, routing::get, Router};
use doorhub_observability::timing_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::RelayResult;
use crate::lifecycle::SessionLifecycle;
use crate::ws::ws_handler;

/// Baut den HTTP-Router des Hubs
pub fn relay_router(lifecycle: SessionLifecycle) -> Router {
    let dashboard = ServeDir::new(&lifecycle.config().dashboard_verzeichnis)
        .append_index_html_on_directories(true);
    let metriken = lifecycle.state().metriken.clone();

    Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(dashboard)
        .layer(middleware::from_fn_with_state(metriken, timing_middleware))
        .layer(CorsLayer::permissive())
        .with_state(lifecycle)
}

/// Startet den HTTP-Server auf einem gebundenen Listener
///
/// Beendet sich beim Shutdown-Signal des Hubs. Offene WebSockets schliessen
/// sich ueber dasselbe Signal selbst.
pub async fn http_server_starten(listener: TcpListener, lifecycle: SessionLifecycle) -> RelayResult<()> {
    let mut shutdown_rx = lifecycle.state().shutdown_abonnieren();
    let app = relay_router(lifecycle);

    tracing::info!(adresse = %listener.local_addr()?, "HTTP-Server gestartet");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("HTTP-Server gestoppt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::{RelayConfig, RelayState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use doorhub_observability::{DoorhubMetrics, FALLBACK_LABEL};
    use tower::ServiceExt;

    fn router_mit_dashboard(dir: &std::path::Path) -> (Router, DoorhubMetrics) {
        let metriken = DoorhubMetrics::neu().unwrap();
        let config = RelayConfig {
            dashboard_verzeichnis: dir.to_path_buf(),
            ..Default::default()
        };
        let state = RelayState::neu(config, metriken.clone());
        (relay_router(SessionLifecycle::neu(state)), metriken)
    }

    #[tokio::test]
    async fn index_html_wird_ausgeliefert() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Tuer</h1>").unwrap();
        let (app, metriken) = router_mit_dashboard(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Tuer</h1>");
        assert_eq!(
            metriken
                .http_requests_total
                .with_label_values(&["GET", FALLBACK_LABEL, "200"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn unbekannte_datei_ist_404() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = router_mit_dashboard(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/fehlt.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn viele_unbekannte_pfade_erzeugen_keine_neuen_serien() {
        let dir = tempfile::tempdir().unwrap();
        let (app, metriken) = router_mit_dashboard(dir.path());

        for i in 0..300 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/scan/{i}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let serien: usize = metriken
            .registry
            .gather()
            .iter()
            .filter(|f| f.get_name() == "doorhub_http_requests_total")
            .map(|f| f.get_metric().len())
            .sum();
        assert_eq!(serien, 1);
    }

    #[tokio::test]
    async fn ws_ohne_upgrade_wird_abgelehnt() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = router_mit_dashboard(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
