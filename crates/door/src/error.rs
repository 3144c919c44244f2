//! Fehlertypen der Produzenten-Seite

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DoorError {
    /// IO-Fehler (TCP)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Hub hat die Verbindung geschlossen
    #[error("Verbindung zum Hub getrennt")]
    VerbindungGetrennt,

    /// Sensor lieferte keinen verwertbaren Wert
    #[error("Sensorfehler: {0}")]
    Sensor(String),

    /// Gesichtserkennung fehlgeschlagen
    #[error("Erkennungsfehler: {0}")]
    Erkennung(String),
}

pub type DoorResult<T> = Result<T, DoorError>;
