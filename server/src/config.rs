//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Host und HTTP-Port lassen sich ueber `DOORHUB_HOST` und
//! `DOORHUB_PORT` ueberschreiben.

use doorhub_observability::{log_format_gueltig, log_level_gueltig};
use doorhub_relay::{RelayConfig, MIN_QUEUE_GROESSE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Hub-Einstellungen
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "doorhub".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// Port fuer HTTP (Dashboard + WebSocket)
    pub http_port: u16,
    /// Port fuer das TCP-Frame-Protokoll der Geraete
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 5000,
            tcp_port: 5001,
        }
    }
}

/// Relay-Hub-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Groesse der Send-Queue pro Verbindung (mindestens 3)
    pub send_queue_groesse: usize,
    /// Wartezeit auf Platz in einer Send-Queue (ms)
    pub zustell_timeout_ms: u64,
    /// Maximale Dauer eines Socket-Schreibvorgangs (ms)
    pub schreib_timeout_ms: u64,
    /// Maximale Dauer fuer das Laden eines Gesichtsbildes (ms)
    pub bild_timeout_ms: u64,
    /// Verzeichnis mit `face_<name>.jpg`
    pub bilder_verzeichnis: String,
    /// Maximale Bildgroesse in Bytes
    pub max_bild_groesse: u64,
    /// Verzeichnis mit den Dashboard-Dateien
    pub dashboard_verzeichnis: String,
    /// Maximale Groesse einer eingehenden Nachricht in Bytes
    pub max_frame_groesse: usize,
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
    /// Begruessungstext fuer neue Verbindungen
    pub begruessung: String,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        let standard = RelayConfig::default();
        Self {
            send_queue_groesse: standard.send_queue_groesse,
            zustell_timeout_ms: standard.zustell_timeout.as_millis() as u64,
            schreib_timeout_ms: standard.schreib_timeout.as_millis() as u64,
            bild_timeout_ms: standard.bild_timeout.as_millis() as u64,
            bilder_verzeichnis: standard.bilder_verzeichnis.to_string_lossy().into_owned(),
            max_bild_groesse: standard.max_bild_groesse,
            dashboard_verzeichnis: standard.dashboard_verzeichnis.to_string_lossy().into_owned(),
            max_frame_groesse: standard.max_frame_groesse,
            max_verbindungen: standard.max_verbindungen,
            begruessung: standard.begruessung,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Wendet `DOORHUB_HOST` / `DOORHUB_PORT` an
    ///
    /// `lesen` liefert den Wert einer Umgebungsvariable (in Tests ersetzbar).
    pub fn umgebung_anwenden(
        &mut self,
        lesen: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(host) = lesen("DOORHUB_HOST") {
            self.netzwerk.bind_adresse = host;
        }
        if let Some(port) = lesen("DOORHUB_PORT") {
            self.netzwerk.http_port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("DOORHUB_PORT '{port}' ungueltig: {e}"))?;
        }
        Ok(())
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekanntes Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format '{}'", self.logging.format);
        }
        if self.relay.send_queue_groesse < MIN_QUEUE_GROESSE {
            anyhow::bail!(
                "relay.send_queue_groesse muss mindestens {} sein",
                MIN_QUEUE_GROESSE
            );
        }
        if self.relay.max_verbindungen == 0 {
            anyhow::bail!("relay.max_verbindungen muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Uebersetzt die Relay-Einstellungen in die Laufzeit-Konfiguration
    pub fn relay_config(&self) -> RelayConfig {
        let r = &self.relay;
        RelayConfig {
            send_queue_groesse: r.send_queue_groesse,
            zustell_timeout: Duration::from_millis(r.zustell_timeout_ms),
            schreib_timeout: Duration::from_millis(r.schreib_timeout_ms),
            bild_timeout: Duration::from_millis(r.bild_timeout_ms),
            bilder_verzeichnis: PathBuf::from(&r.bilder_verzeichnis),
            max_bild_groesse: r.max_bild_groesse,
            dashboard_verzeichnis: PathBuf::from(&r.dashboard_verzeichnis),
            max_frame_groesse: r.max_frame_groesse,
            max_verbindungen: r.max_verbindungen,
            begruessung: r.begruessung.clone(),
        }
    }

    /// Gibt die Bind-Adresse fuer HTTP zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Gibt die Bind-Adresse fuer das TCP-Frame-Protokoll zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
