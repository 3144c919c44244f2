//! Typisierte Ereignisse
//!
//! Eingehende Envelopes werden an der Grenze genau einmal gegen ein festes
//! Schema geprueft und in ein `DoorEvent` ueberfuehrt. Unbekannte
//! Ereignisnamen und falsch geformte Nutzlasten werden deterministisch
//! abgelehnt.
//!
//! ## Zuordnung eingehend -> ausgehend
//! ```text
//! message         -> object_detected_status
//! door_status     -> door_status
//! face_recognise  -> face_recognise (+ image_data falls Bild angehaengt)
//! image_data      -> image_data
//! button_click    -> data_from_server
//! btnClick        -> button_click_client
//! ledState        -> ledState
//! ack             -> (nichts)
//! ```

use base64::Engine;
use bytes::Bytes;
use doorhub_core::Rolle;
use serde_json::{json, Value};
use thiserror::Error;

use crate::envelope::{namen, Ack, Envelope, SERVER_GRUSS};

/// Name, den die Kamera meldet wenn kein Gesicht erkannt wurde
pub const UNBEKANNTES_GESICHT: &str = "unknown";

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Klassifizieren eingehender Nachrichten
///
/// Beide Varianten fuehren zum Verwerfen der Nachricht ohne Quittung.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Ereignisname ist nicht bekannt
    #[error("Unbekannte Ereignisart: {0}")]
    UnbekannteArt(String),

    /// Envelope oder Nutzlast passt nicht zum Schema
    #[error("Ungueltige Nutzlast ({event}): {grund}")]
    UngueltigeNutzlast { event: String, grund: String },
}

impl EventError {
    /// Erstellt einen Nutzlast-Fehler fuer das angegebene Ereignis
    pub fn nutzlast(event: &str, grund: impl Into<String>) -> Self {
        Self::UngueltigeNutzlast {
            event: event.to_string(),
            grund: grund.into(),
        }
    }

    /// Kurzer Grund fuer Metrik-Labels
    pub fn grund(&self) -> &'static str {
        match self {
            Self::UnbekannteArt(_) => "unknown_kind",
            Self::UngueltigeNutzlast { .. } => "malformed_payload",
        }
    }
}

// ---------------------------------------------------------------------------
// Hilfstypen
// ---------------------------------------------------------------------------

/// Zustand des Tuerschlosses wie vom Sensor gemeldet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schlosszustand {
    Verriegelt,
    Entriegelt,
}

impl Schlosszustand {
    /// Liest den Zustand aus dem Freitext des Geraets ("Door Unlocked", "locked", ...)
    pub fn aus_text(text: &str) -> Option<Self> {
        let klein = text.to_ascii_lowercase();
        if klein.contains("unlocked") {
            Some(Self::Entriegelt)
        } else if klein.contains("locked") {
            Some(Self::Verriegelt)
        } else {
            None
        }
    }
}

/// Herkunft eines Knopfdrucks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knopfquelle {
    /// `button_click` vom Tuer-Dashboard
    Tuer,
    /// `btnClick` vom Smart-Home-Dashboard
    Haus,
}

// ---------------------------------------------------------------------------
// DoorEvent
// ---------------------------------------------------------------------------

/// Ein klassifiziertes Ereignis
#[derive(Debug, Clone, PartialEq)]
pub enum DoorEvent {
    /// Abstandssensor meldet ein Objekt (`message`)
    ObjektErkannt(Value),
    /// Tuer wurde ver- oder entriegelt (`door_status`)
    Tuerstatus {
        zustand: Schlosszustand,
        /// Originaltext, wird unveraendert weitergegeben
        text: String,
    },
    /// Gesichtserkennung meldet eine Identitaet (`face_recognise`)
    Gesicht { name: String, bild: Option<Bytes> },
    /// Vom Geraet gesendete Bilddaten (`image_data`)
    Bilddaten(Value),
    /// Knopf auf einem Dashboard gedrueckt
    Knopfdruck { quelle: Knopfquelle, data: Value },
    /// LED-Zustand eines Smart-Home-Geraets (`ledState`)
    LedZustand(Value),
    /// Quittung einer Gegenstelle
    Ack(Ack),
}

impl DoorEvent {
    /// Klassifiziert einen eingehenden Envelope
    pub fn aus_envelope(envelope: Envelope) -> Result<Self, EventError> {
        let Envelope { event, data, .. } = envelope;

        match event.as_str() {
            namen::MESSAGE => Ok(Self::ObjektErkannt(data)),

            namen::DOOR_STATUS => {
                let text = data
                    .as_str()
                    .ok_or_else(|| EventError::nutzlast(&event, "Text erwartet"))?;
                let zustand = Schlosszustand::aus_text(text).ok_or_else(|| {
                    EventError::nutzlast(&event, format!("Unbekannter Tuerstatus '{text}'"))
                })?;
                Ok(Self::Tuerstatus {
                    zustand,
                    text: text.to_string(),
                })
            }

            namen::FACE_RECOGNISE => {
                let name = data
                    .as_str()
                    .ok_or_else(|| EventError::nutzlast(&event, "Name als Text erwartet"))?;
                Ok(Self::Gesicht {
                    name: name.to_string(),
                    bild: None,
                })
            }

            namen::IMAGE_DATA => {
                if data.is_null() {
                    return Err(EventError::nutzlast(&event, "Bilddaten fehlen"));
                }
                Ok(Self::Bilddaten(data))
            }

            namen::BUTTON_CLICK => Ok(Self::Knopfdruck {
                quelle: Knopfquelle::Tuer,
                data,
            }),

            namen::BTN_CLICK => Ok(Self::Knopfdruck {
                quelle: Knopfquelle::Haus,
                data,
            }),

            namen::LED_STATE => Ok(Self::LedZustand(data)),

            namen::ACK => serde_json::from_value::<Ack>(data)
                .map(Self::Ack)
                .map_err(|e| EventError::nutzlast(&event, e.to_string())),

            _ => Err(EventError::UnbekannteArt(event)),
        }
    }

    /// Kurzname der Ereignisart (Logs, Metrik-Labels)
    pub fn art(&self) -> &'static str {
        match self {
            Self::ObjektErkannt(_) => "object_detected",
            Self::Tuerstatus { .. } => "door_status",
            Self::Gesicht { .. } => "face_identity",
            Self::Bilddaten(_) => "image_payload",
            Self::Knopfdruck { .. } => "button_click",
            Self::LedZustand(_) => "led_state",
            Self::Ack(_) => "ack",
        }
    }

    /// Rolle, als die dieses Ereignis seinen Absender ausweist
    ///
    /// Quittungen klassifizieren nicht.
    pub fn sender_rolle(&self) -> Rolle {
        match self {
            Self::Knopfdruck { .. } => Rolle::Beobachter,
            Self::Ack(_) => Rolle::Unbekannt,
            _ => Rolle::Produzent,
        }
    }

    /// Ob fuer dieses Ereignis eine Quittung zurueckgeschickt wird
    pub fn braucht_quittung(&self) -> bool {
        !matches!(self, Self::Ack(_))
    }

    /// Ob ein Gesichtsname eine echte Identitaet bezeichnet
    pub fn ist_bekanntes_gesicht(name: &str) -> bool {
        !name.is_empty() && name != UNBEKANNTES_GESICHT
    }

    /// Die Envelopes, die an Beobachter verteilt werden (in dieser Reihenfolge)
    pub fn ausgehend(&self) -> Vec<Envelope> {
        match self {
            Self::ObjektErkannt(data) => {
                vec![Envelope::neu(namen::OBJECT_DETECTED_STATUS, data.clone())]
            }
            Self::Tuerstatus { text, .. } => {
                vec![Envelope::neu(namen::DOOR_STATUS, Value::String(text.clone()))]
            }
            Self::Gesicht { name, bild } => {
                let mut envelopes = vec![Envelope::neu(
                    namen::FACE_RECOGNISE,
                    Value::String(name.clone()),
                )];
                if let Some(bild) = bild {
                    let kodiert = base64::engine::general_purpose::STANDARD.encode(bild);
                    envelopes.push(Envelope::neu(
                        namen::IMAGE_DATA,
                        json!({ "data": kodiert, "name": name }),
                    ));
                }
                envelopes
            }
            Self::Bilddaten(data) => vec![Envelope::neu(namen::IMAGE_DATA, data.clone())],
            Self::Knopfdruck {
                quelle: Knopfquelle::Tuer,
                ..
            } => vec![Envelope::neu(
                namen::DATA_FROM_SERVER,
                Value::String(SERVER_GRUSS.to_string()),
            )],
            Self::Knopfdruck {
                quelle: Knopfquelle::Haus,
                data,
            } => vec![Envelope::neu(namen::BUTTON_CLICK_CLIENT, data.clone())],
            Self::LedZustand(data) => vec![Envelope::neu(namen::LED_STATE, data.clone())],
            Self::Ack(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn env(event: &str, data: Value) -> Envelope {
        Envelope::neu(event, data)
    }

    #[test]
    fn tuerstatus_wird_erkannt() {
        let ereignis =
            DoorEvent::aus_envelope(env("door_status", json!("Door Unlocked"))).unwrap();
        assert_eq!(
            ereignis,
            DoorEvent::Tuerstatus {
                zustand: Schlosszustand::Entriegelt,
                text: "Door Unlocked".into()
            }
        );

        let ereignis = DoorEvent::aus_envelope(env("door_status", json!("Door Locked"))).unwrap();
        assert!(matches!(
            ereignis,
            DoorEvent::Tuerstatus {
                zustand: Schlosszustand::Verriegelt,
                ..
            }
        ));
    }

    #[test]
    fn tuerstatus_ohne_text_ist_ungueltig() {
        let fehler = DoorEvent::aus_envelope(env("door_status", json!({"x": 1}))).unwrap_err();
        assert!(matches!(fehler, EventError::UngueltigeNutzlast { .. }));
        assert_eq!(fehler.grund(), "malformed_payload");

        let fehler = DoorEvent::aus_envelope(env("door_status", json!("ajar"))).unwrap_err();
        assert!(matches!(fehler, EventError::UngueltigeNutzlast { .. }));
    }

    #[test]
    fn unbekannte_art_wird_abgelehnt() {
        let fehler = DoorEvent::aus_envelope(env("foo", json!({}))).unwrap_err();
        assert_eq!(fehler, EventError::UnbekannteArt("foo".into()));
        assert_eq!(fehler.grund(), "unknown_kind");
    }

    #[test]
    fn image_size_ist_keine_bekannte_art() {
        let fehler = DoorEvent::aus_envelope(env("image_size", json!({"size": 10}))).unwrap_err();
        assert!(matches!(fehler, EventError::UnbekannteArt(_)));
    }

    #[test]
    fn gesicht_braucht_text() {
        let fehler = DoorEvent::aus_envelope(env("face_recognise", json!(42))).unwrap_err();
        assert!(matches!(fehler, EventError::UngueltigeNutzlast { .. }));
    }

    #[test]
    fn quittung_wird_geparst() {
        let ereignis = DoorEvent::aus_envelope(env(
            "ack",
            json!({"status": "received", "code": 200}),
        ))
        .unwrap();
        assert_eq!(ereignis, DoorEvent::Ack(Ack::empfangen()));
        assert!(!ereignis.braucht_quittung());
        assert!(ereignis.ausgehend().is_empty());
        assert_eq!(ereignis.sender_rolle(), Rolle::Unbekannt);
    }

    #[test]
    fn bekannte_gesichter() {
        assert!(DoorEvent::ist_bekanntes_gesicht("hemanth"));
        assert!(!DoorEvent::ist_bekanntes_gesicht("unknown"));
        assert!(!DoorEvent::ist_bekanntes_gesicht(""));
    }

    #[test]
    fn nachricht_wird_als_object_detected_status_verteilt() {
        let ereignis =
            DoorEvent::aus_envelope(env("message", json!("Object detected"))).unwrap();
        let aus = ereignis.ausgehend();
        assert_eq!(aus.len(), 1);
        assert_eq!(aus[0].event, "object_detected_status");
        assert_eq!(aus[0].data, json!("Object detected"));
        assert_eq!(ereignis.sender_rolle(), Rolle::Produzent);
    }

    #[test]
    fn gesicht_mit_bild_erzeugt_zwei_envelopes() {
        let ereignis = DoorEvent::Gesicht {
            name: "hemanth".into(),
            bild: Some(Bytes::from_static(b"\xff\xd8jpeg")),
        };
        let aus = ereignis.ausgehend();
        assert_eq!(aus.len(), 2);
        assert_eq!(aus[0].event, "face_recognise");
        assert_eq!(aus[0].data, json!("hemanth"));
        assert_eq!(aus[1].event, "image_data");
        assert_eq!(aus[1].data["name"], json!("hemanth"));

        let kodiert = aus[1].data["data"].as_str().unwrap();
        let dekodiert = base64::engine::general_purpose::STANDARD
            .decode(kodiert)
            .unwrap();
        assert_eq!(dekodiert, b"\xff\xd8jpeg");
    }

    #[test]
    fn gesicht_ohne_bild_erzeugt_einen_envelope() {
        let ereignis = DoorEvent::Gesicht {
            name: "unknown".into(),
            bild: None,
        };
        assert_eq!(ereignis.ausgehend().len(), 1);
    }

    #[test]
    fn knopfdruck_zuordnung() {
        let tuer = DoorEvent::aus_envelope(env("button_click", json!("open"))).unwrap();
        assert_eq!(tuer.sender_rolle(), Rolle::Beobachter);
        let aus = tuer.ausgehend();
        assert_eq!(aus[0].event, "data_from_server");
        assert_eq!(aus[0].data, json!(SERVER_GRUSS));

        let haus = DoorEvent::aus_envelope(env("btnClick", json!({"pin": 8}))).unwrap();
        let aus = haus.ausgehend();
        assert_eq!(aus[0].event, "button_click_client");
        assert_eq!(aus[0].data, json!({"pin": 8}));
    }

    #[test]
    fn led_zustand_wird_gespiegelt() {
        let ereignis =
            DoorEvent::aus_envelope(env("ledState", json!({"ledState": "on"}))).unwrap();
        let aus = ereignis.ausgehend();
        assert_eq!(aus[0].event, "ledState");
        assert_eq!(aus[0].data, json!({"ledState": "on"}));
    }

    #[test]
    fn bilddaten_ohne_inhalt_sind_ungueltig() {
        let fehler = DoorEvent::aus_envelope(env("image_data", Value::Null)).unwrap_err();
        assert!(matches!(fehler, EventError::UngueltigeNutzlast { .. }));
    }
}
