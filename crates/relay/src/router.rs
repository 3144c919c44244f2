//! Event-Router – Klassifiziert, aktualisiert Zustand, bestimmt Empfaenger
//!
//! Ablauf pro eingehender Nachricht:
//! 1. Envelope parsen und gegen das Schema pruefen (`DoorEvent`)
//! 2. Geteilten Zustand aktualisieren (Tuerstatus, Identitaet)
//! 3. Bei bekannter Identitaet das Bild anhaengen (Fehler degradieren)
//! 4. Zielgruppe und Quittung bestimmen
//!
//! Der Router sendet selbst nichts, die Verteilung uebernimmt der
//! `BroadcastDispatcher`.

use doorhub_core::{ConnectionId, Rolle};
use doorhub_protocol::{DoorEvent, Envelope, EventError, Knopfquelle};
use std::sync::Arc;
use std::time::Duration;

use crate::image_store::BildQuelle;
use crate::shared_state::SharedState;

// ---------------------------------------------------------------------------
// Ergebnis
// ---------------------------------------------------------------------------

/// Wer ein geroutetes Ereignis erhaelt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zielgruppe {
    /// Alle Verbindungen, die nicht als Produzent klassifiziert sind
    Beobachter,
    /// Alle Verbindungen ausser der Quelle
    AlleAusser(ConnectionId),
    /// Niemand (z.B. Quittungen)
    Niemand,
}

/// Ergebnis des Routings einer Nachricht
#[derive(Debug, Clone)]
pub struct RouterOutcome {
    pub ereignis: DoorEvent,
    /// Rolle, als die das Ereignis seinen Absender ausweist
    pub rolle: Rolle,
    pub ziel: Zielgruppe,
    /// Quittung fuer den Absender, `None` bei eingehenden Quittungen
    pub quittung: Option<Envelope>,
}

// ---------------------------------------------------------------------------
// EventRouter
// ---------------------------------------------------------------------------

/// Routet rohe Nachrichten zu typisierten Ereignissen
#[derive(Clone)]
pub struct EventRouter {
    shared: SharedState,
    bilder: Arc<dyn BildQuelle>,
    bild_timeout: Duration,
}

impl EventRouter {
    pub fn neu(shared: SharedState, bilder: Arc<dyn BildQuelle>, bild_timeout: Duration) -> Self {
        Self {
            shared,
            bilder,
            bild_timeout,
        }
    }

    /// Routet eine rohe Nachricht der Verbindung `quelle`
    ///
    /// Ungueltige Nachrichten aendern keinen Zustand.
    pub async fn route(&self, quelle: ConnectionId, roh: &[u8]) -> Result<RouterOutcome, EventError> {
        let envelope: Envelope = serde_json::from_slice(roh)
            .map_err(|e| EventError::nutzlast("<envelope>", e.to_string()))?;
        let id = envelope.id;
        let mut ereignis = DoorEvent::aus_envelope(envelope)?;

        match &mut ereignis {
            DoorEvent::Tuerstatus { zustand, text } => {
                self.shared.tuerstatus_setzen(*zustand, text);
            }
            DoorEvent::Gesicht { name, bild } => {
                self.shared.identitaet_setzen(name);
                if DoorEvent::ist_bekanntes_gesicht(name) {
                    *bild = self.bild_anhaengen(name).await;
                }
            }
            _ => {}
        }

        let ziel = match &ereignis {
            DoorEvent::Ack(_) => Zielgruppe::Niemand,
            DoorEvent::Knopfdruck {
                quelle: Knopfquelle::Haus,
                ..
            } => Zielgruppe::AlleAusser(quelle),
            _ => Zielgruppe::Beobachter,
        };

        let quittung = ereignis.braucht_quittung().then(|| Envelope::quittung(id));

        tracing::debug!(
            verbindung = %quelle,
            art = ereignis.art(),
            "Nachricht geroutet"
        );

        Ok(RouterOutcome {
            rolle: ereignis.sender_rolle(),
            ereignis,
            ziel,
            quittung,
        })
    }

    /// Laedt das Bild zu einer Identitaet, `None` bei Fehler oder Timeout
    async fn bild_anhaengen(&self, name: &str) -> Option<bytes::Bytes> {
        match tokio::time::timeout(self.bild_timeout, self.bilder.bild_laden(name)).await {
            Ok(Ok(bild)) => Some(bild),
            Ok(Err(e)) => {
                tracing::warn!(name = name, fehler = %e, "Ereignis wird ohne Bild zugestellt");
                None
            }
            Err(_) => {
                tracing::warn!(
                    name = name,
                    timeout_ms = self.bild_timeout.as_millis() as u64,
                    "Bild-Timeout, Ereignis wird ohne Bild zugestellt"
                );
                None
            }
        }
    }

    pub fn shared_state(&self) -> &SharedState {
        &self.shared
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
