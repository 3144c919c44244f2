//! Session-Lifecycle – Oeffnen, Verarbeiten, Schliessen von Verbindungen
//!
//! Transport-unabhaengig: TCP- und WebSocket-Verbindungen nutzen denselben
//! Ablauf.
//!
//! ## Zustandsautomat pro Verbindung
//! ```text
//! Unbekannt --(Produzenten-Ereignis)--> Produzent
//! Unbekannt --(Knopfdruck)-----------> Beobachter
//! *         --(Trennung/Zustellfehler)-> Geschlossen
//! ```

use doorhub_core::{ConnectionId, Rolle};
use doorhub_protocol::{namen, Envelope};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};
use crate::server_state::{RelayConfig, RelayState};
use crate::shared_state::ZustandsSnapshot;

/// Eine frisch registrierte Verbindung
pub struct GeoeffneteVerbindung {
    pub id: ConnectionId,
    /// Empfangsende der Send-Queue; endet wenn die Verbindung entfernt wird
    pub ausgang: mpsc::Receiver<Envelope>,
}

/// Begruessung fuer eine neue Verbindung
///
/// `data_from_server` mit dem letzten bekannten Zustand, danach die letzten
/// `door_status`- und `face_recognise`-Ereignisse in ihrer Originalform.
pub fn begruessung(text: &str, snapshot: &ZustandsSnapshot) -> Vec<Envelope> {
    let mut envelopes = vec![Envelope::neu(
        namen::DATA_FROM_SERVER,
        json!({
            "message": text,
            "door_status": snapshot.tuerstatus,
            "face_recognise": snapshot.identitaet,
        }),
    )];
    if let Some(status) = &snapshot.tuerstatus {
        envelopes.push(Envelope::neu(namen::DOOR_STATUS, Value::String(status.clone())));
    }
    if let Some(name) = &snapshot.identitaet {
        envelopes.push(Envelope::neu(namen::FACE_RECOGNISE, Value::String(name.clone())));
    }
    envelopes
}

/// Verwaltet den Lebenszyklus aller Verbindungen
///
/// Clone teilt den `RelayState`.
#[derive(Clone)]
pub struct SessionLifecycle {
    state: Arc<RelayState>,
}

impl SessionLifecycle {
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    pub fn config(&self) -> &RelayConfig {
        &self.state.config
    }

    /// Registriert eine neue Verbindung und stellt die Begruessung ein
    ///
    /// Registrierung und Begruessung passieren unter der Zustandssperre:
    /// jedes spaetere Ereignis landet hinter der Begruessung in der Queue.
    pub fn verbindung_oeffnen(&self, peer: &str) -> RelayResult<GeoeffneteVerbindung> {
        let max = self.state.config.max_verbindungen;

        // Limit-Pruefung und Registrierung unter demselben Lock
        let geoeffnet = self.state.shared.gesperrt(|snapshot| {
            if self.state.registry.anzahl() >= max {
                return Err(RelayError::ServerVoll(max));
            }
            let (handle, ausgang) = self.state.registry.registrieren(peer);
            for envelope in begruessung(&self.state.config.begruessung, snapshot) {
                if handle.tx.try_send(envelope).is_err() {
                    tracing::debug!(verbindung = %handle.id, "Send-Queue zu klein fuer Begruessung");
                    break;
                }
            }
            Ok((handle, ausgang))
        });
        let (handle, ausgang) = match geoeffnet {
            Ok(offen) => offen,
            Err(e) => {
                tracing::warn!(peer = peer, max = max, "Server voll, Verbindung abgelehnt");
                return Err(e);
            }
        };

        self.state.verbindungen_zaehlen();
        tracing::info!(verbindung = %handle.id, peer = peer, "Verbindung geoeffnet");

        Ok(GeoeffneteVerbindung {
            id: handle.id,
            ausgang,
        })
    }

    /// Verarbeitet eine eingehende Nachricht
    ///
    /// Gibt die Quittung fuer den Absender zurueck. Ungueltige Nachrichten
    /// werden geloggt und verworfen, die Verbindung bleibt offen.
    pub async fn nachricht_verarbeiten(&self, id: ConnectionId, roh: &[u8]) -> Option<Envelope> {
        let metriken = &self.state.metriken;

        let outcome = match self.state.router.route(id, roh).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(verbindung = %id, fehler = %e, "Nachricht verworfen");
                metriken
                    .events_dropped_total
                    .with_label_values(&[e.grund()])
                    .inc();
                return None;
            }
        };

        if outcome.rolle != Rolle::Unbekannt {
            self.state.registry.rolle_klassifizieren(&id, outcome.rolle);
        }
        metriken
            .events_total
            .with_label_values(&[outcome.ereignis.art()])
            .inc();

        let start = Instant::now();
        let bericht = self
            .state
            .dispatcher
            .broadcast(&outcome.ereignis, &outcome.ziel)
            .await;
        metriken
            .broadcast_duration_seconds
            .observe(start.elapsed().as_secs_f64());

        if bericht.fehler_anzahl() > 0 {
            metriken
                .delivery_failures_total
                .inc_by(bericht.fehler_anzahl() as u64);
            let entfernt = self.state.registry.aufraeumen();
            self.state.verbindungen_zaehlen();
            tracing::info!(
                verbindung = %id,
                entfernt = entfernt.len(),
                "Verbindungen nach Zustellfehler entfernt"
            );
        }

        tracing::debug!(
            verbindung = %id,
            art = outcome.ereignis.art(),
            zugestellt = bericht.zugestellt_anzahl(),
            "Ereignis verteilt"
        );

        outcome.quittung
    }

    /// Entfernt eine Verbindung aus der Registry
    ///
    /// Idempotent, loest keinen Broadcast aus.
    pub fn verbindung_schliessen(&self, id: &ConnectionId) {
        if let Some(info) = self.state.registry.entfernen(id) {
            let dauer = chrono::Utc::now() - info.verbunden_seit;
            tracing::info!(
                verbindung = %id,
                peer = %info.peer,
                rolle = %info.rolle,
                dauer_sek = dauer.num_seconds(),
                "Verbindung geschlossen"
            );
        }
        self.state.verbindungen_zaehlen();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
