//! Connection-Registry – Wer ist verbunden, in welcher Rolle
//!
//! Jede offene Verbindung hat genau einen Eintrag mit ihrer Send-Queue.
//! Die Registry haelt den einzigen `Sender` jeder Queue: wird ein Eintrag
//! entfernt, endet die Queue und der Verbindungs-Task beendet sich.
//!
//! Verbindungen, deren Zustellung fehlschlug, werden zunaechst nur als tot
//! markiert (sofort aus Broadcasts ausgeschlossen) und spaeter in
//! `aufraeumen` entfernt.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use doorhub_core::{ConnectionId, Rolle};
use doorhub_protocol::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Kleinste Send-Queue: eine Begruessung besteht aus bis zu drei Envelopes,
/// ein Ereignis aus hoechstens zwei. Beides muss am Stueck hineinpassen.
pub const MIN_QUEUE_GROESSE: usize = 3;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer registrierten Verbindung
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    pub id: ConnectionId,
    pub rolle: Rolle,
    pub tx: mpsc::Sender<Envelope>,
}

/// Momentaufnahme eines Registry-Eintrags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbindungsInfo {
    pub id: ConnectionId,
    pub rolle: Rolle,
    pub peer: String,
    pub verbunden_seit: DateTime<Utc>,
    pub lebendig: bool,
}

struct Verbindung {
    rolle: Rolle,
    peer: String,
    verbunden_seit: DateTime<Utc>,
    lebendig: bool,
    tx: mpsc::Sender<Envelope>,
}

impl Verbindung {
    fn handle(&self, id: ConnectionId) -> RegistryHandle {
        RegistryHandle {
            id,
            rolle: self.rolle,
            tx: self.tx.clone(),
        }
    }

    fn info(&self, id: ConnectionId) -> VerbindungsInfo {
        VerbindungsInfo {
            id,
            rolle: self.rolle,
            peer: self.peer.clone(),
            verbunden_seit: self.verbunden_seit,
            lebendig: self.lebendig,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Verzeichnis aller offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    verbindungen: DashMap<ConnectionId, Verbindung>,
    queue_groesse: usize,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry mit der angegebenen Send-Queue-Groesse
    ///
    /// Werte unter `MIN_QUEUE_GROESSE` werden angehoben.
    pub fn neu(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                verbindungen: DashMap::new(),
                queue_groesse: queue_groesse.max(MIN_QUEUE_GROESSE),
            }),
        }
    }

    /// Registriert eine neue Verbindung mit Rolle `Unbekannt`
    ///
    /// Gibt das Handle und das Empfangsende der Send-Queue zurueck.
    pub fn registrieren(&self, peer: impl Into<String>) -> (RegistryHandle, mpsc::Receiver<Envelope>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        let verbindung = Verbindung {
            rolle: Rolle::Unbekannt,
            peer: peer.into(),
            verbunden_seit: Utc::now(),
            lebendig: true,
            tx,
        };
        let handle = verbindung.handle(id);
        self.inner.verbindungen.insert(id, verbindung);

        tracing::debug!(verbindung = %id, "Verbindung registriert");
        (handle, rx)
    }

    /// Entfernt eine Verbindung
    ///
    /// Idempotent: ein zweiter Aufruf fuer dieselbe ID liefert `None`.
    pub fn entfernen(&self, id: &ConnectionId) -> Option<VerbindungsInfo> {
        let (id, verbindung) = self.inner.verbindungen.remove(id)?;
        tracing::debug!(verbindung = %id, "Verbindung entfernt");
        Some(verbindung.info(id))
    }

    /// Alle lebenden Verbindungen, die Broadcasts empfangen (keine Produzenten)
    pub fn beobachter_auflisten(&self) -> Vec<RegistryHandle> {
        self.inner
            .verbindungen
            .iter()
            .filter(|e| e.lebendig && e.rolle.empfaengt_broadcasts())
            .map(|e| e.handle(*e.key()))
            .collect()
    }

    /// Alle lebenden Verbindungen ausser der angegebenen, unabhaengig von der Rolle
    pub fn alle_ausser(&self, ausgeschlossen: &ConnectionId) -> Vec<RegistryHandle> {
        self.inner
            .verbindungen
            .iter()
            .filter(|e| e.lebendig && e.key() != ausgeschlossen)
            .map(|e| e.handle(*e.key()))
            .collect()
    }

    /// Handle einer einzelnen Verbindung
    pub fn handle(&self, id: &ConnectionId) -> Option<RegistryHandle> {
        self.inner.verbindungen.get(id).map(|e| e.handle(*id))
    }

    /// Momentaufnahme einer einzelnen Verbindung
    pub fn info(&self, id: &ConnectionId) -> Option<VerbindungsInfo> {
        self.inner.verbindungen.get(id).map(|e| e.info(*id))
    }

    /// Aktuelle Rolle einer Verbindung
    pub fn rolle(&self, id: &ConnectionId) -> Option<Rolle> {
        self.inner.verbindungen.get(id).map(|e| e.rolle)
    }

    /// Klassifiziert eine Verbindung anhand eines empfangenen Ereignisses
    ///
    /// Nur `Unbekannt` wird ueberschrieben. Gibt die resultierende Rolle
    /// zurueck, `None` falls die Verbindung nicht (mehr) registriert ist.
    pub fn rolle_klassifizieren(&self, id: &ConnectionId, neu: Rolle) -> Option<Rolle> {
        let mut eintrag = self.inner.verbindungen.get_mut(id)?;
        let vorher = eintrag.rolle;
        eintrag.rolle = vorher.klassifizieren(neu);
        if eintrag.rolle != vorher {
            tracing::info!(verbindung = %id, rolle = %eintrag.rolle, "Verbindung klassifiziert");
        }
        Some(eintrag.rolle)
    }

    /// Schliesst eine Verbindung von weiteren Broadcasts aus
    pub fn als_tot_markieren(&self, id: &ConnectionId) {
        if let Some(mut eintrag) = self.inner.verbindungen.get_mut(id) {
            eintrag.lebendig = false;
        }
    }

    /// Entfernt alle als tot markierten Verbindungen
    pub fn aufraeumen(&self) -> Vec<ConnectionId> {
        let tote: Vec<ConnectionId> = self
            .inner
            .verbindungen
            .iter()
            .filter(|e| !e.lebendig)
            .map(|e| *e.key())
            .collect();

        for id in &tote {
            self.inner.verbindungen.remove_if(id, |_, v| !v.lebendig);
            tracing::info!(verbindung = %id, "Tote Verbindung entfernt");
        }
        tote
    }

    /// Anzahl registrierter Verbindungen (inkl. tot markierter)
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    /// Kapazitaet jeder Send-Queue
    pub fn queue_groesse(&self) -> usize {
        self.inner.queue_groesse
    }

    pub fn ist_registriert(&self, id: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu(64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
