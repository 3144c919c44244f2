//! Zuletzt bekannter Zustand der Tuer
//!
//! Haelt den letzten Tuerstatus und die letzte erkannte Identitaet. Jeder
//! Schreibzugriff ersetzt den Wert vollstaendig (last-write-wins). Der
//! Mutex wird nie ueber ein `.await` gehalten.

use chrono::{DateTime, Utc};
use doorhub_protocol::Schlosszustand;
use parking_lot::Mutex;
use std::sync::Arc;

/// Momentaufnahme des geteilten Zustands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZustandsSnapshot {
    /// Letzter Tuerstatus im Originaltext des Sensors
    pub tuerstatus: Option<String>,
    pub schloss: Option<Schlosszustand>,
    /// Letzter Name aus der Gesichtserkennung (auch "unknown")
    pub identitaet: Option<String>,
    pub aktualisiert_am: Option<DateTime<Utc>>,
}

/// Geteilter "zuletzt bekannt"-Zustand
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<ZustandsSnapshot>>,
}

impl SharedState {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Ersetzt den Tuerstatus
    pub fn tuerstatus_setzen(&self, zustand: Schlosszustand, text: &str) {
        let mut guard = self.inner.lock();
        guard.tuerstatus = Some(text.to_string());
        guard.schloss = Some(zustand);
        guard.aktualisiert_am = Some(Utc::now());
    }

    /// Ersetzt die zuletzt erkannte Identitaet
    pub fn identitaet_setzen(&self, name: &str) {
        let mut guard = self.inner.lock();
        guard.identitaet = Some(name.to_string());
        guard.aktualisiert_am = Some(Utc::now());
    }

    /// Kopie des aktuellen Zustands
    pub fn snapshot(&self) -> ZustandsSnapshot {
        self.inner.lock().clone()
    }

    /// Fuehrt `f` aus, waehrend der Zustand gesperrt ist
    ///
    /// Solange `f` laeuft, kann kein Ereignis den Zustand aendern. Die
    /// Begruessung neuer Verbindungen nutzt das, damit der Snapshot und die
    /// Registrierung zusammenpassen. `f` darf nicht blockieren.
    pub fn gesperrt<R>(&self, f: impl FnOnce(&ZustandsSnapshot) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }
}
