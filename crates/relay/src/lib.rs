//! doorhub-relay – Event-Relay-Hub fuer die smarte Tuer
//!
//! Dieser Crate nimmt Ereignisse von Produzenten (Tuersensor, Kamera)
//! entgegen, prueft und routet sie, fuehrt den zuletzt bekannten Zustand
//! und verteilt sie an alle Beobachter (Dashboards).
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayTcpServer)      HTTP (relay_router)
//!     |                                  |  GET /ws
//!     v                                  v
//! ClientConnection                   ws_verbindung
//!     |  (pro Verbindung ein Task)       |
//!     +---------------+------------------+
//!                     v
//!             SessionLifecycle
//!                     |  oeffnen -> verarbeiten* -> schliessen
//!                     v
//!             EventRouter  --> SharedState (letzter Tuerstatus, Identitaet)
//!                     |    --> BildQuelle  (face_<name>.jpg)
//!                     v
//!             BroadcastDispatcher --> ConnectionRegistry (Send-Queues)
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod http;
pub mod image_store;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod shared_state;
pub mod tcp;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::{BroadcastDispatcher, DispatchReport};
pub use connection::ClientConnection;
pub use error::{DeliveryError, EventError, RelayError, RelayResult, ResourceError};
pub use http::{http_server_starten, relay_router};
pub use image_store::{BildQuelle, DateiBildQuelle};
pub use lifecycle::{GeoeffneteVerbindung, SessionLifecycle};
pub use registry::{ConnectionRegistry, RegistryHandle, VerbindungsInfo, MIN_QUEUE_GROESSE};
pub use router::{EventRouter, RouterOutcome, Zielgruppe};
pub use server_state::{RelayConfig, RelayState};
pub use shared_state::{SharedState, ZustandsSnapshot};
pub use tcp::RelayTcpServer;
