//! Envelope – Das gemeinsame Nachrichtenformat aller Verbindungen
//!
//! ```json
//! {"event": "door_status", "data": "Door Unlocked", "id": 7}
//! ```
//!
//! `id` ist optional. Ist sie gesetzt, wird sie in der Quittung
//! zurueckgegeben, damit ein Produzent spaeter Wiederholungen zuordnen kann.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stabile Ereignisnamen (kompatibel zu bestehenden Geraeten und Dashboards)
pub mod namen {
    // Eingehend
    pub const MESSAGE: &str = "message";
    pub const DOOR_STATUS: &str = "door_status";
    pub const FACE_RECOGNISE: &str = "face_recognise";
    pub const IMAGE_DATA: &str = "image_data";
    pub const BUTTON_CLICK: &str = "button_click";
    pub const BTN_CLICK: &str = "btnClick";
    pub const LED_STATE: &str = "ledState";
    pub const ACK: &str = "ack";

    // Ausgehend
    pub const OBJECT_DETECTED_STATUS: &str = "object_detected_status";
    pub const DATA_FROM_SERVER: &str = "data_from_server";
    pub const BUTTON_CLICK_CLIENT: &str = "button_click_client";
}

/// Text, mit dem der Server Dashboards begruesst
pub const SERVER_GRUSS: &str = "hello this is from the server";

/// Ein Nachrichten-Envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ereignisname
    pub event: String,
    /// Beliebige Nutzlast
    #[serde(default)]
    pub data: Value,
    /// Optionale Korrelations-ID fuer Quittungen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Envelope {
    /// Erstellt einen Envelope ohne Korrelations-ID
    pub fn neu(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            id: None,
        }
    }

    /// Setzt die Korrelations-ID
    pub fn mit_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Erstellt die Quittung fuer eine empfangene Nachricht
    pub fn quittung(id: Option<u64>) -> Self {
        Self {
            event: namen::ACK.to_string(),
            data: Ack::empfangen().als_json(),
            id,
        }
    }

    /// Prueft ob es sich um eine Quittung handelt
    pub fn ist_quittung(&self) -> bool {
        self.event == namen::ACK
    }
}

/// Empfangsbestaetigung `{status: "received", code: 200}`
///
/// Rein informativ: ein Produzent darf fehlende Quittungen ignorieren.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub code: u16,
}

impl Ack {
    /// Die Standard-Quittung des Hubs
    pub fn empfangen() -> Self {
        Self {
            status: "received".to_string(),
            code: 200,
        }
    }

    /// Ob die Quittung eine erfolgreiche Annahme meldet
    pub fn ist_erfolgreich(&self) -> bool {
        self.status == "received" && self.code == 200
    }

    fn als_json(&self) -> Value {
        serde_json::json!({ "status": self.status, "code": self.code })
    }
}
