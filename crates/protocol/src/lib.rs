//! doorhub-protocol – Nachrichten zwischen Geraeten, Hub und Dashboards
//!
//! Jede Nachricht ist ein JSON-Envelope `{event, data}`. Dieses Crate
//! definiert den Envelope, die Quittung, die typisierten Ereignisse mit
//! Schema-Pruefung an der Grenze und das Frame-Format fuer TCP.

pub mod envelope;
pub mod event;
pub mod wire;

pub use envelope::{namen, Ack, Envelope};
pub use event::{DoorEvent, EventError, Knopfquelle, Schlosszustand};
pub use wire::FrameCodec;
