//! Broadcast-Dispatcher – Verteilt Ereignisse an ihre Zielgruppe
//!
//! Alle Empfaenger werden gleichzeitig bedient. Jede Zustellung hat ein
//! eigenes Timeout, eine langsame oder tote Verbindung verzoegert die
//! anderen daher hoechstens um dieses Timeout.
//!
//! Ein Ereignis kann aus mehreren Envelopes bestehen (Gesicht + Bild). Pro
//! Verbindung werden zuerst Plaetze fuer alle Envelopes reserviert und erst
//! dann gesendet: entweder kommt das ganze Ereignis an oder nichts davon.

use doorhub_core::ConnectionId;
use doorhub_protocol::{DoorEvent, Envelope};
use futures_util::future::join_all;
use std::time::Duration;

use crate::error::DeliveryError;
use crate::registry::{ConnectionRegistry, RegistryHandle};
use crate::router::Zielgruppe;

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// Ergebnis eines Broadcasts
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub zugestellt: Vec<ConnectionId>,
    pub fehlgeschlagen: Vec<(ConnectionId, DeliveryError)>,
}

impl DispatchReport {
    pub fn zugestellt_anzahl(&self) -> usize {
        self.zugestellt.len()
    }

    pub fn fehler_anzahl(&self) -> usize {
        self.fehlgeschlagen.len()
    }

    /// IDs der Verbindungen, an die nicht zugestellt werden konnte
    pub fn fehlgeschlagene_ids(&self) -> Vec<ConnectionId> {
        self.fehlgeschlagen.iter().map(|(id, _)| *id).collect()
    }
}

// ---------------------------------------------------------------------------
// BroadcastDispatcher
// ---------------------------------------------------------------------------

/// Verteilt Ereignisse ueber die Send-Queues der Registry
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
    zustell_timeout: Duration,
}

impl BroadcastDispatcher {
    pub fn neu(registry: ConnectionRegistry, zustell_timeout: Duration) -> Self {
        Self {
            registry,
            zustell_timeout,
        }
    }

    /// Sendet ein Ereignis an seine Zielgruppe
    ///
    /// Fehlgeschlagene Verbindungen werden als tot markiert.
    pub async fn broadcast(&self, ereignis: &DoorEvent, ziel: &Zielgruppe) -> DispatchReport {
        self.verteilen(&ereignis.ausgehend(), ziel).await
    }

    /// Sendet fertige Envelopes an eine Zielgruppe
    pub async fn verteilen(&self, envelopes: &[Envelope], ziel: &Zielgruppe) -> DispatchReport {
        if envelopes.is_empty() {
            return DispatchReport::default();
        }

        let empfaenger = match ziel {
            Zielgruppe::Beobachter => self.registry.beobachter_auflisten(),
            Zielgruppe::AlleAusser(quelle) => self.registry.alle_ausser(quelle),
            Zielgruppe::Niemand => return DispatchReport::default(),
        };

        let timeout = self.zustell_timeout;
        let ergebnisse = join_all(empfaenger.into_iter().map(|handle| async move {
            let ergebnis = zustellen(&handle, envelopes, timeout).await;
            (handle.id, ergebnis)
        }))
        .await;

        let mut bericht = DispatchReport::default();
        for (id, ergebnis) in ergebnisse {
            match ergebnis {
                Ok(()) => bericht.zugestellt.push(id),
                Err(e) => {
                    tracing::warn!(verbindung = %id, fehler = %e, "Zustellung fehlgeschlagen");
                    self.registry.als_tot_markieren(&id);
                    bericht.fehlgeschlagen.push((id, e));
                }
            }
        }

        tracing::trace!(
            zugestellt = bericht.zugestellt_anzahl(),
            fehlgeschlagen = bericht.fehler_anzahl(),
            "Broadcast abgeschlossen"
        );
        bericht
    }
}

/// Stellt alle Envelopes an eine Verbindung zu (alles oder nichts)
async fn zustellen(
    handle: &RegistryHandle,
    envelopes: &[Envelope],
    timeout: Duration,
) -> Result<(), DeliveryError> {
    let permits = match tokio::time::timeout(timeout, handle.tx.reserve_many(envelopes.len())).await {
        Ok(Ok(permits)) => permits,
        Ok(Err(_)) => return Err(DeliveryError::PeerNichtErreichbar),
        Err(_) => return Err(DeliveryError::Zeitueberschreitung(timeout)),
    };

    for (permit, envelope) in permits.zip(envelopes) {
        permit.send(envelope.clone());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MIN_QUEUE_GROESSE;
    use bytes::Bytes;
    use doorhub_core::Rolle;
    use doorhub_protocol::Schlosszustand;
    use serde_json::json;

    fn tuer_offen() -> DoorEvent {
        DoorEvent::Tuerstatus {
            zustand: Schlosszustand::Entriegelt,
            text: "Door Unlocked".into(),
        }
    }

    fn dispatcher(registry: &ConnectionRegistry) -> BroadcastDispatcher {
        BroadcastDispatcher::neu(registry.clone(), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn alle_beobachter_erhalten_das_ereignis() {
        let registry = ConnectionRegistry::default();
        let (_a, mut rx_a) = registry.registrieren("a");
        let (_b, mut rx_b) = registry.registrieren("b");

        let bericht = dispatcher(&registry)
            .broadcast(&tuer_offen(), &Zielgruppe::Beobachter)
            .await;
        assert_eq!(bericht.zugestellt_anzahl(), 2);
        assert_eq!(bericht.fehler_anzahl(), 0);

        for rx in [&mut rx_a, &mut rx_b] {
            let env = rx.recv().await.unwrap();
            assert_eq!(env.event, "door_status");
            assert_eq!(env.data, json!("Door Unlocked"));
        }
    }

    #[tokio::test]
    async fn produzent_erhaelt_nichts() {
        let registry = ConnectionRegistry::default();
        let (sensor, mut rx_sensor) = registry.registrieren("sensor");
        let (_dash, mut rx_dash) = registry.registrieren("dashboard");
        registry.rolle_klassifizieren(&sensor.id, Rolle::Produzent);

        dispatcher(&registry)
            .broadcast(&tuer_offen(), &Zielgruppe::Beobachter)
            .await;

        assert!(rx_dash.try_recv().is_ok());
        assert!(rx_sensor.try_recv().is_err());
    }

    #[tokio::test]
    async fn geschlossene_queue_betrifft_nur_diese_verbindung() {
        let registry = ConnectionRegistry::default();
        let (tot, rx_tot) = registry.registrieren("tot");
        let (ok, mut rx_ok) = registry.registrieren("ok");
        drop(rx_tot);

        let bericht = dispatcher(&registry)
            .broadcast(&tuer_offen(), &Zielgruppe::Beobachter)
            .await;

        assert_eq!(bericht.zugestellt, vec![ok.id]);
        assert_eq!(
            bericht.fehlgeschlagen,
            vec![(tot.id, DeliveryError::PeerNichtErreichbar)]
        );
        assert!(rx_ok.try_recv().is_ok());

        // Tote Verbindung ist sofort aus weiteren Broadcasts ausgeschlossen
        let ids: Vec<_> = registry.beobachter_auflisten().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![ok.id]);
        assert_eq!(registry.aufraeumen(), vec![tot.id]);
    }

    #[tokio::test]
    async fn volle_queue_laeuft_ins_timeout() {
        let registry = ConnectionRegistry::neu(MIN_QUEUE_GROESSE);
        let (langsam, _rx_langsam) = registry.registrieren("langsam");
        let (_ok, mut rx_ok) = registry.registrieren("ok");
        while langsam.tx.try_send(Envelope::neu("message", json!("fuellt"))).is_ok() {}

        let bericht = dispatcher(&registry)
            .broadcast(&tuer_offen(), &Zielgruppe::Beobachter)
            .await;

        assert_eq!(bericht.fehlgeschlagene_ids(), vec![langsam.id]);
        assert!(matches!(
            bericht.fehlgeschlagen[0].1,
            DeliveryError::Zeitueberschreitung(_)
        ));
        assert!(rx_ok.try_recv().is_ok());
    }

    #[tokio::test]
    async fn gesicht_mit_bild_kommt_vollstaendig_an() {
        let registry = ConnectionRegistry::default();
        let (_a, mut rx) = registry.registrieren("a");
        let ereignis = DoorEvent::Gesicht {
            name: "alice".into(),
            bild: Some(Bytes::from_static(b"JPEG")),
        };

        dispatcher(&registry)
            .broadcast(&ereignis, &Zielgruppe::Beobachter)
            .await;

        let erstes = rx.recv().await.unwrap();
        assert_eq!(erstes.event, "face_recognise");
        assert_eq!(erstes.data, json!("alice"));
        let zweites = rx.recv().await.unwrap();
        assert_eq!(zweites.event, "image_data");
        assert_eq!(zweites.data["name"], json!("alice"));
    }

    #[tokio::test]
    async fn kein_teilweise_zugestelltes_ereignis() {
        // Platz fuer nur einen von zwei Envelopes
        let registry = ConnectionRegistry::neu(MIN_QUEUE_GROESSE);
        let (h, mut rx) = registry.registrieren("a");
        for _ in 1..MIN_QUEUE_GROESSE {
            h.tx.try_send(Envelope::neu("message", json!("alt"))).unwrap();
        }
        let ereignis = DoorEvent::Gesicht {
            name: "alice".into(),
            bild: Some(Bytes::from_static(b"JPEG")),
        };

        let bericht = dispatcher(&registry)
            .broadcast(&ereignis, &Zielgruppe::Beobachter)
            .await;
        assert_eq!(bericht.fehler_anzahl(), 1);

        for _ in 1..MIN_QUEUE_GROESSE {
            assert_eq!(rx.recv().await.unwrap().data, json!("alt"));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn kleinste_queue_nimmt_gesicht_mit_bild_auf() {
        let registry = ConnectionRegistry::neu(1);
        assert_eq!(registry.queue_groesse(), MIN_QUEUE_GROESSE);
        let (h, mut rx) = registry.registrieren("a");
        let ereignis = DoorEvent::Gesicht {
            name: "alice".into(),
            bild: Some(Bytes::from_static(b"JPEG")),
        };

        let bericht = dispatcher(&registry)
            .broadcast(&ereignis, &Zielgruppe::Beobachter)
            .await;

        assert_eq!(bericht.zugestellt, vec![h.id]);
        assert_eq!(bericht.fehler_anzahl(), 0);
        assert!(registry.beobachter_auflisten().iter().any(|b| b.id == h.id));
        assert_eq!(rx.recv().await.unwrap().event, "face_recognise");
        assert_eq!(rx.recv().await.unwrap().event, "image_data");
    }

    #[tokio::test]
    async fn leere_zielgruppe_und_quittungen() {
        let registry = ConnectionRegistry::default();
        let (_a, mut rx) = registry.registrieren("a");

        let bericht = dispatcher(&registry)
            .broadcast(&tuer_offen(), &Zielgruppe::Niemand)
            .await;
        assert_eq!(bericht.zugestellt_anzahl(), 0);

        let bericht = dispatcher(&registry)
            .broadcast(
                &DoorEvent::Ack(doorhub_protocol::Ack::empfangen()),
                &Zielgruppe::Beobachter,
            )
            .await;
        assert_eq!(bericht.zugestellt_anzahl(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn alle_ausser_quelle() {
        let registry = ConnectionRegistry::default();
        let (quelle, mut rx_quelle) = registry.registrieren("quelle");
        let (_geraet, mut rx_geraet) = registry.registrieren("geraet");

        let envelopes = [Envelope::neu("button_click_client", json!({"led": true}))];
        dispatcher(&registry)
            .verteilen(&envelopes, &Zielgruppe::AlleAusser(quelle.id))
            .await;

        assert_eq!(rx_geraet.try_recv().unwrap().event, "button_click_client");
        assert!(rx_quelle.try_recv().is_err());
    }
}
