//! Uhr-Abstraktion
//!
//! Der Schloss-Automat fragt die Zeit nur ueber `Uhr` ab, damit Tests die
//! Zeit von Hand vorstellen koennen.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Uhr: Send + Sync {
    fn jetzt(&self) -> Instant;
}

/// Echte Systemzeit (monoton)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUhr;

impl Uhr for SystemUhr {
    fn jetzt(&self) -> Instant {
        Instant::now()
    }
}

/// Manuell gestellte Uhr fuer Tests
///
/// Clone teilt die Zeit.
#[derive(Debug, Clone)]
pub struct TestUhr {
    start: Instant,
    versatz: Arc<Mutex<Duration>>,
}

impl TestUhr {
    pub fn neu() -> Self {
        Self {
            start: Instant::now(),
            versatz: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Stellt die Uhr um `dauer` vor
    pub fn vorstellen(&self, dauer: Duration) {
        *self.versatz.lock() += dauer;
    }
}

impl Default for TestUhr {
    fn default() -> Self {
        Self::neu()
    }
}

impl Uhr for TestUhr {
    fn jetzt(&self) -> Instant {
        self.start + *self.versatz.lock()
    }
}
