//! Gemeinsamer Zustand des Relay-Hubs
//!
//! Haelt Registry, geteilten Tuerzustand, Router, Dispatcher und Metriken
//! als Arc-geteilte Services fuer alle Verbindungs-Tasks.

use doorhub_observability::DoorhubMetrics;
use doorhub_protocol::envelope::SERVER_GRUSS;
use doorhub_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::broadcast::BroadcastDispatcher;
use crate::image_store::{BildQuelle, DateiBildQuelle};
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;
use crate::shared_state::SharedState;

/// Konfiguration fuer den Relay-Hub
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Groesse der Send-Queue pro Verbindung (mindestens `MIN_QUEUE_GROESSE`)
    pub send_queue_groesse: usize,
    /// Maximale Wartezeit auf Platz in einer Send-Queue
    pub zustell_timeout: Duration,
    /// Maximale Dauer eines Schreibvorgangs auf den Socket
    pub schreib_timeout: Duration,
    /// Maximale Dauer fuer das Laden eines Gesichtsbildes
    pub bild_timeout: Duration,
    /// Verzeichnis mit `face_<name>.jpg`
    pub bilder_verzeichnis: PathBuf,
    /// Maximale Bildgroesse in Bytes
    pub max_bild_groesse: u64,
    /// Statische Dashboard-Dateien
    pub dashboard_verzeichnis: PathBuf,
    /// Maximale Groesse einer eingehenden Nachricht (TCP-Frame, WebSocket)
    pub max_frame_groesse: usize,
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
    /// Text der Begruessung neuer Verbindungen
    pub begruessung: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            send_queue_groesse: 64,
            zustell_timeout: Duration::from_millis(300),
            schreib_timeout: Duration::from_secs(5),
            bild_timeout: Duration::from_secs(1),
            bilder_verzeichnis: PathBuf::from("."),
            max_bild_groesse: 2 * 1024 * 1024,
            dashboard_verzeichnis: PathBuf::from("sources"),
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            max_verbindungen: 256,
            begruessung: SERVER_GRUSS.to_string(),
        }
    }
}

/// Gemeinsamer Hub-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub registry: ConnectionRegistry,
    pub shared: SharedState,
    pub router: EventRouter,
    pub dispatcher: BroadcastDispatcher,
    pub metriken: DoorhubMetrics,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
    shutdown_tx: watch::Sender<bool>,
}

impl RelayState {
    /// Erstellt den Zustand mit Bildern aus `config.bilder_verzeichnis`
    pub fn neu(config: RelayConfig, metriken: DoorhubMetrics) -> Arc<Self> {
        let bilder = DateiBildQuelle::neu(config.bilder_verzeichnis.clone(), config.max_bild_groesse);
        Self::mit_bildquelle(config, metriken, Arc::new(bilder))
    }

    /// Erstellt den Zustand mit einer eigenen Bildquelle
    pub fn mit_bildquelle(
        config: RelayConfig,
        metriken: DoorhubMetrics,
        bilder: Arc<dyn BildQuelle>,
    ) -> Arc<Self> {
        let registry = ConnectionRegistry::neu(config.send_queue_groesse);
        let shared = SharedState::neu();
        let router = EventRouter::neu(shared.clone(), bilder, config.bild_timeout);
        let dispatcher = BroadcastDispatcher::neu(registry.clone(), config.zustell_timeout);
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            config: Arc::new(config),
            registry,
            shared,
            router,
            dispatcher,
            metriken,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Empfaenger fuer das Shutdown-Signal
    pub fn shutdown_abonnieren(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signalisiert allen Listenern und Verbindungen das Herunterfahren
    pub fn herunterfahren(&self) {
        tracing::info!("Relay-Hub wird heruntergefahren");
        self.shutdown_tx.send_replace(true);
    }

    pub fn wird_heruntergefahren(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Setzt die Verbindungs-Gauge auf den aktuellen Registry-Stand
    pub(crate) fn verbindungen_zaehlen(&self) {
        self.metriken
            .connected_clients
            .set(self.registry.anzahl() as f64);
    }
}
