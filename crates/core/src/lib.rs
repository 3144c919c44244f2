//! doorhub-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay, Producer-Seite und
//! Server gemeinsam nutzen: die opake Verbindungs-ID und die Rolle einer
//! Verbindung.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConnectionId, Rolle};
