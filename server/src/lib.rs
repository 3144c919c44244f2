//! doorhub-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Relay-Hub, HTTP/WebSocket, TCP und
//! Observability zu einem lauffaehigen Server.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use doorhub_observability::{observability_server_starten, DoorhubMetrics, HealthState};
use doorhub_relay::{http_server_starten, RelayState, RelayTcpServer, SessionLifecycle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Wie lange beim Herunterfahren auf die Listener gewartet wird
const SHUTDOWN_FRIST: Duration = Duration::from_secs(5);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    ///
    /// Reihenfolge:
    /// 1. Metriken und Hub-Zustand anlegen
    /// 2. TCP-Listener (Geraete) und HTTP-Listener (Dashboards) binden
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Auf Ctrl-C warten, dann alle Tasks ueber das Shutdown-Signal beenden
    pub async fn starten(self) -> Result<()> {
        self.starten_bis(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
            }
        })
        .await
    }

    /// Wie `starten`, endet aber sobald `stopp` fertig ist
    pub async fn starten_bis(self, stopp: impl std::future::Future<Output = ()>) -> Result<()> {
        let metriken = DoorhubMetrics::neu()?;
        let state = RelayState::neu(self.config.relay_config(), metriken.clone());
        let lifecycle = SessionLifecycle::neu(Arc::clone(&state));

        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        let tcp_listener = TcpListener::bind(self.config.tcp_bind_adresse()).await?;
        let http_listener = TcpListener::bind(self.config.http_bind_adresse()).await?;
        let tcp_server = RelayTcpServer::mit_listener(lifecycle.clone(), tcp_listener);

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = tcp_server.starten().await {
                tracing::error!(fehler = %e, "TCP-Server beendet mit Fehler");
            }
        }));
        tasks.push(tokio::spawn(async move {
            if let Err(e) = http_server_starten(http_listener, lifecycle).await {
                tracing::error!(fehler = %e, "HTTP-Server beendet mit Fehler");
            }
        }));

        let registry = state.registry.clone();
        let health = HealthState::neu(Arc::new(move || registry.anzahl()));
        if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .map_err(|e| anyhow::anyhow!("Ungueltige Observability-Adresse: {e}"))?;
            let shutdown_rx = state.shutdown_abonnieren();
            let health = health.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health, shutdown_rx).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet mit Fehler");
                }
            }));
        }

        health.bereit_setzen(true);
        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        stopp.await;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        health.bereit_setzen(false);
        state.herunterfahren();

        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_FRIST, task).await.is_err() {
                tracing::warn!("Listener hat sich nicht rechtzeitig beendet");
            }
        }
        Ok(())
    }
}
