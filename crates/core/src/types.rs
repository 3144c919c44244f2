//! Identifikations- und Rollentypen fuer doorhub
//!
//! Die Verbindungs-ID verwendet das Newtype-Pattern, damit sie nicht mit
//! anderen UUIDs verwechselt werden kann.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opake ID einer Transport-Verbindung (TCP oder WebSocket)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Rolle einer Verbindung
///
/// ```text
/// Unbekannt -> Produzent
///           -> Beobachter
/// ```
///
/// Der Uebergang ist einseitig: die erste klassifizierende Nachricht legt die
/// Rolle fest, spaetere Nachrichten aendern sie nicht mehr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    /// Frisch verbunden, noch nichts gesendet
    Unbekannt,
    /// Sendet Ereignisse (Tuersensor, Kamera)
    Produzent,
    /// Empfaengt Ereignisse (Dashboard)
    Beobachter,
}

impl Rolle {
    /// Wendet eine Klassifizierung an und gibt die resultierende Rolle zurueck
    pub fn klassifizieren(self, neu: Rolle) -> Rolle {
        match self {
            Rolle::Unbekannt => neu,
            fest => fest,
        }
    }

    /// Ob die Verbindung Broadcasts an Beobachter empfaengt
    pub fn empfaengt_broadcasts(self) -> bool {
        !matches!(self, Rolle::Produzent)
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rolle::Unbekannt => "unbekannt",
            Rolle::Produzent => "produzent",
            Rolle::Beobachter => "beobachter",
        };
        f.write_str(name)
    }
}
