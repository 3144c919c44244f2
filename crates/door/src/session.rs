//! Produzenten-Sitzung – Messwerte und Erkennungen zu Ereignissen
//!
//! Die Sitzung besitzt den Schloss-Automaten und erzeugt Envelopes in der
//! Reihenfolge, die Dashboards erwarten:
//!
//! ```text
//! Oeffnen:     message "Object detected" -> face_recognise <name> -> door_status "Door Unlocked"
//! Verriegeln:  message "Object Not detected" -> face_recognise "unknown" -> door_status "Door Locked"
//! ```
//!
//! Unbekannte Gesichter oeffnen nicht: es wird nur `face_recognise` gemeldet
//! und das Schloss bleibt verriegelt.

use async_trait::async_trait;
use doorhub_protocol::{event::UNBEKANNTES_GESICHT, namen, DoorEvent, Envelope};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;

use crate::clock::Uhr;
use crate::error::DoorResult;
use crate::lock::TuerSchloss;

/// Messwerte unterhalb dieser Schwelle bedeuten "Objekt vor der Tuer"
pub const STANDARD_SCHWELLE: f32 = 0.5;

pub mod texte {
    pub const OBJEKT_ERKANNT: &str = "Object detected";
    pub const OBJEKT_WEG: &str = "Object Not detected";
    pub const TUER_OFFEN: &str = "Door Unlocked";
    pub const TUER_ZU: &str = "Door Locked";
}

// ---------------------------------------------------------------------------
// Schnittstellen
// ---------------------------------------------------------------------------

/// Abstandssensor; `None` wenn gerade kein Wert vorliegt
#[async_trait]
pub trait Sensor: Send {
    async fn lesen(&mut self) -> DoorResult<Option<f32>>;
}

/// Gesichtserkennung; liefert den Namen oder "unknown"
#[async_trait]
pub trait Gesichtserkennung: Send {
    async fn erkennen(&mut self) -> DoorResult<String>;
}

/// Ziel fuer erzeugte Envelopes (in Produktion der `ProducerClient`)
#[async_trait]
pub trait EreignisSenke: Send {
    async fn senden(&mut self, envelope: Envelope) -> DoorResult<()>;
}

fn text(event: &str, inhalt: &str) -> Envelope {
    Envelope::neu(event, Value::String(inhalt.to_string()))
}

// ---------------------------------------------------------------------------
// ProducerSession
// ---------------------------------------------------------------------------

pub struct ProducerSession<U: Uhr> {
    schloss: TuerSchloss,
    uhr: U,
    schwelle: f32,
}

impl<U: Uhr> ProducerSession<U> {
    pub fn neu(uhr: U, schwelle: f32, offen_dauer: Duration) -> Self {
        Self {
            schloss: TuerSchloss::neu(offen_dauer),
            uhr,
            schwelle,
        }
    }

    pub fn schloss(&self) -> &TuerSchloss {
        &self.schloss
    }

    /// Verarbeitet einen Sensorwert
    ///
    /// Loest nur im verriegelten Zustand aus.
    pub fn messwert(&mut self, wert: f32) -> Vec<Envelope> {
        if wert >= self.schwelle || !self.schloss.ausloesen() {
            return Vec::new();
        }
        tracing::info!(wert = wert, "Objekt erkannt");
        vec![text(namen::MESSAGE, texte::OBJEKT_ERKANNT)]
    }

    /// Verarbeitet das Ergebnis der Gesichtserkennung
    pub fn gesicht(&mut self, name: &str) -> Vec<Envelope> {
        let mut envelopes = vec![text(namen::FACE_RECOGNISE, name)];

        if DoorEvent::ist_bekanntes_gesicht(name) {
            if self.schloss.entriegeln(self.uhr.jetzt()) {
                tracing::info!(name = name, "Tuer entriegelt");
                envelopes.push(text(namen::DOOR_STATUS, texte::TUER_OFFEN));
            }
        } else if self.schloss.abbrechen() {
            tracing::info!("Unbekanntes Gesicht, Tuer bleibt verriegelt");
        }
        envelopes
    }

    /// Prueft die Offenzeit und verriegelt ggf.
    pub fn tick(&mut self) -> Vec<Envelope> {
        if !self.schloss.tick(self.uhr.jetzt()) {
            return Vec::new();
        }
        tracing::info!("Tuer verriegelt");
        vec![
            text(namen::MESSAGE, texte::OBJEKT_WEG),
            text(namen::FACE_RECOGNISE, UNBEKANNTES_GESICHT),
            text(namen::DOOR_STATUS, texte::TUER_ZU),
        ]
    }

    /// Ein Durchlauf: Offenzeit pruefen, Sensor lesen, ggf. Gesicht erkennen
    ///
    /// Sensor- und Erkennungsfehler werden geloggt, nur Sendefehler beenden.
    pub async fn schritt<S, G, K>(&mut self, sensor: &mut S, erkennung: &mut G, senke: &mut K) -> DoorResult<()>
    where
        S: Sensor,
        G: Gesichtserkennung,
        K: EreignisSenke,
    {
        for envelope in self.tick() {
            senke.senden(envelope).await?;
        }

        let wert = match sensor.lesen().await {
            Ok(Some(wert)) => wert,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(fehler = %e, "Sensor nicht lesbar");
                return Ok(());
            }
        };

        let ausgeloest = self.messwert(wert);
        if ausgeloest.is_empty() {
            return Ok(());
        }
        for envelope in ausgeloest {
            senke.senden(envelope).await?;
        }

        let name = match erkennung.erkennen().await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(fehler = %e, "Gesichtserkennung fehlgeschlagen");
                UNBEKANNTES_GESICHT.to_string()
            }
        };
        for envelope in self.gesicht(&name) {
            senke.senden(envelope).await?;
        }
        Ok(())
    }

    /// Fuehrt `schritt` im festen Takt aus bis zum Shutdown-Signal
    pub async fn laufen<S, G, K>(
        &mut self,
        sensor: &mut S,
        erkennung: &mut G,
        senke: &mut K,
        takt: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> DoorResult<()>
    where
        S: Sensor,
        G: Gesichtserkennung,
        K: EreignisSenke,
    {
        let mut intervall = tokio::time::interval(takt);
        intervall.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = intervall.tick() => {
                    self.schritt(sensor, erkennung, senke).await?;
                }
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Produzenten-Sitzung beendet");
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
