//! Ende-zu-Ende: Produzenten-Sitzung -> Hub -> Dashboard

use async_trait::async_trait;
use doorhub_door::{
    DoorResult, Gesichtserkennung, ProducerClient, ProducerSession, Sensor, TestUhr,
};
use doorhub_observability::DoorhubMetrics;
use doorhub_protocol::{wire::FrameCodec, Envelope};
use doorhub_relay::{RelayConfig, RelayState, RelayTcpServer, SessionLifecycle};
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

struct EinWert(Option<f32>);

#[async_trait]
impl Sensor for EinWert {
    async fn lesen(&mut self) -> DoorResult<Option<f32>> {
        Ok(self.0.take())
    }
}

struct Kamera;

#[async_trait]
impl Gesichtserkennung for Kamera {
    async fn erkennen(&mut self) -> DoorResult<String> {
        Ok("hemanth".to_string())
    }
}

async fn empfangen(client: &mut Framed<TcpStream, FrameCodec>) -> Envelope {
    let roh = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timeout")
        .expect("Verbindung geschlossen")
        .expect("Frame-Fehler");
    serde_json::from_slice(&roh).unwrap()
}

#[tokio::test]
async fn tuerzyklus_erreicht_das_dashboard() {
    let state = RelayState::neu(RelayConfig::default(), DoorhubMetrics::neu().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = RelayTcpServer::mit_listener(SessionLifecycle::neu(state.clone()), listener);
    let addr = server.lokale_adresse().unwrap();
    tokio::spawn(server.starten());

    let mut dashboard = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::new());
    assert_eq!(empfangen(&mut dashboard).await.event, "data_from_server");

    let uhr = TestUhr::neu();
    let mut session = ProducerSession::neu(uhr.clone(), 0.5, Duration::from_secs(10));
    let mut client = ProducerClient::verbinden(addr).await.unwrap();
    let mut sensor = EinWert(Some(0.2));

    session.schritt(&mut sensor, &mut Kamera, &mut client).await.unwrap();
    uhr.vorstellen(Duration::from_secs(10));
    session.schritt(&mut sensor, &mut Kamera, &mut client).await.unwrap();

    let mut erhalten = Vec::new();
    for _ in 0..6 {
        let env = empfangen(&mut dashboard).await;
        erhalten.push((env.event, env.data));
    }
    let p = |e: &str, d: &str| (e.to_string(), Value::String(d.to_string()));
    assert_eq!(
        erhalten,
        vec![
            p("object_detected_status", "Object detected"),
            p("face_recognise", "hemanth"),
            p("door_status", "Door Unlocked"),
            p("object_detected_status", "Object Not detected"),
            p("face_recognise", "unknown"),
            p("door_status", "Door Locked"),
        ]
    );

    let snap = state.shared.snapshot();
    assert_eq!(snap.tuerstatus.as_deref(), Some("Door Locked"));
    assert_eq!(snap.identitaet, Some("unknown".to_string()));
}
