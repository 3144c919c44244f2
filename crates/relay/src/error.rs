//! Fehlertypen fuer den Relay-Hub

use std::time::Duration;
use thiserror::Error;

pub use doorhub_protocol::EventError;

/// Zustellung an eine einzelne Verbindung fehlgeschlagen
///
/// Betrifft nur diese Verbindung, der Broadcast an alle anderen laeuft weiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Send-Queue ist geschlossen (Verbindung bereits abgebaut)
    #[error("Gegenstelle nicht erreichbar")]
    PeerNichtErreichbar,

    /// Send-Queue blieb laenger als das Zustell-Timeout voll
    #[error("Zustellung nach {0:?} abgebrochen")]
    Zeitueberschreitung(Duration),
}

/// Fehler beim Laden externer Ressourcen
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Bild fuer eine Identitaet fehlt oder ist nicht lesbar
    #[error("Bild fuer '{name}' nicht verfuegbar: {grund}")]
    BildNichtVerfuegbar { name: String, grund: String },
}

impl ResourceError {
    pub fn bild(name: &str, grund: impl Into<String>) -> Self {
        Self::BildNichtVerfuegbar {
            name: name.to_string(),
            grund: grund.into(),
        }
    }
}

/// Fehlertyp fuer Transport und Verbindungsverwaltung
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Maximale Anzahl gleichzeitiger Verbindungen erreicht
    #[error("Server ist voll ({0} Verbindungen)")]
    ServerVoll(usize),

    /// Schreiben an die Gegenstelle dauerte zu lange
    #[error("Schreib-Timeout nach {0:?}")]
    SchreibTimeout(Duration),

    /// Fehler auf WebSocket-Ebene
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(String),
}

/// Result-Typ fuer den Relay-Hub
pub type RelayResult<T> = Result<T, RelayError>;
