//! Schloss-Zustandsautomat mit Abkuehlzeit
//!
//! ```text
//! Verriegelt --ausloesen--> Entriegelnd --entriegeln--> Offen{bis}
//!     ^                          |                          |
//!     +-------abbrechen----------+                          |
//!     +--------------------tick (jetzt >= bis)--------------+
//! ```
//!
//! Solange das Schloss `Entriegelnd` oder `Offen` ist, loesen weitere
//! Messwerte nichts aus. So entsteht pro Oeffnung genau ein Ereignis.

use std::time::{Duration, Instant};

/// Standard-Offenzeit nach dem Entriegeln
pub const STANDARD_OFFEN_DAUER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchlossPhase {
    Verriegelt,
    /// Objekt erkannt, Gesichtserkennung laeuft
    Entriegelnd,
    /// Tuer offen bis zum angegebenen Zeitpunkt
    Offen { bis: Instant },
}

#[derive(Debug, Clone)]
pub struct TuerSchloss {
    phase: SchlossPhase,
    offen_dauer: Duration,
}

impl TuerSchloss {
    pub fn neu(offen_dauer: Duration) -> Self {
        Self {
            phase: SchlossPhase::Verriegelt,
            offen_dauer,
        }
    }

    pub fn phase(&self) -> SchlossPhase {
        self.phase
    }

    pub fn ist_verriegelt(&self) -> bool {
        self.phase == SchlossPhase::Verriegelt
    }

    /// Startet das Entriegeln; `false` wenn bereits ein Vorgang laeuft
    pub fn ausloesen(&mut self) -> bool {
        if self.phase != SchlossPhase::Verriegelt {
            return false;
        }
        self.phase = SchlossPhase::Entriegelnd;
        true
    }

    /// Oeffnet das Schloss bis `jetzt + offen_dauer`
    pub fn entriegeln(&mut self, jetzt: Instant) -> bool {
        if self.phase != SchlossPhase::Entriegelnd {
            return false;
        }
        self.phase = SchlossPhase::Offen {
            bis: jetzt + self.offen_dauer,
        };
        true
    }

    /// Bricht ein laufendes Entriegeln ab
    pub fn abbrechen(&mut self) -> bool {
        if self.phase != SchlossPhase::Entriegelnd {
            return false;
        }
        self.phase = SchlossPhase::Verriegelt;
        true
    }

    /// Verriegelt nach Ablauf der Offenzeit; `true` beim Uebergang
    pub fn tick(&mut self, jetzt: Instant) -> bool {
        match self.phase {
            SchlossPhase::Offen { bis } if jetzt >= bis => {
                self.phase = SchlossPhase::Verriegelt;
                true
            }
            _ => false,
        }
    }
}

impl Default for TuerSchloss {
    fn default() -> Self {
        Self::neu(STANDARD_OFFEN_DAUER)
    }
}
