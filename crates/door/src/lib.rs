//! doorhub-door – Produzenten-Seite der smarten Tuer
//!
//! Setzt Sensorwerte und Gesichtserkennungen in Ereignisse fuer den Hub um.
//! Die Abkuehlzeit nach dem Entriegeln ist ein expliziter Zustandsautomat
//! (`TuerSchloss`), die Zeit kommt ueber die `Uhr`-Abstraktion.
//! Kamera und Sensor-Hardware bleiben hinter den Traits `Sensor` und
//! `Gesichtserkennung`.

pub mod client;
pub mod clock;
pub mod error;
pub mod lock;
pub mod session;

pub use client::ProducerClient;
pub use clock::{SystemUhr, TestUhr, Uhr};
pub use error::{DoorError, DoorResult};
pub use lock::{SchlossPhase, TuerSchloss};
pub use session::{EreignisSenke, Gesichtserkennung, ProducerSession, Sensor};
