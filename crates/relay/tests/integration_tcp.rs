//! Integration-Tests ueber echte TCP-Verbindungen mit FrameCodec

use base64::Engine;
use doorhub_observability::DoorhubMetrics;
use doorhub_protocol::{wire::FrameCodec, Envelope};
use doorhub_relay::{RelayConfig, RelayState, RelayTcpServer, SessionLifecycle};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, FrameCodec>;

struct Hub {
    state: Arc<RelayState>,
    addr: SocketAddr,
    _bilder: tempfile::TempDir,
}

async fn hub_starten() -> Hub {
    let bilder = tempfile::tempdir().expect("Tempdir");
    std::fs::write(bilder.path().join("face_alice.jpg"), b"\xff\xd8alice").unwrap();

    let config = RelayConfig {
        bilder_verzeichnis: bilder.path().to_path_buf(),
        ..Default::default()
    };
    let state = RelayState::neu(config, DoorhubMetrics::neu().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = RelayTcpServer::mit_listener(SessionLifecycle::neu(Arc::clone(&state)), listener);
    let addr = server.lokale_adresse().unwrap();
    tokio::spawn(server.starten());

    Hub {
        state,
        addr,
        _bilder: bilder,
    }
}

/// Verbindet und liest die Begruessung
async fn verbinden(hub: &Hub) -> (Client, Vec<Envelope>) {
    let stream = TcpStream::connect(hub.addr).await.unwrap();
    let mut client = Framed::new(stream, FrameCodec::new());

    let gruss = empfangen(&mut client).await;
    assert_eq!(gruss.event, "data_from_server");
    let mut alle = vec![gruss.clone()];
    // Nachgespielte Ereignisse folgen nur bei bekanntem Zustand
    for feld in ["door_status", "face_recognise"] {
        if !gruss.data[feld].is_null() {
            alle.push(empfangen(&mut client).await);
        }
    }
    (client, alle)
}

async fn empfangen(client: &mut Client) -> Envelope {
    let roh = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timeout beim Empfangen")
        .expect("Verbindung geschlossen")
        .expect("Frame-Fehler");
    serde_json::from_slice(&roh).expect("Envelope erwartet")
}

async fn nichts_empfangen(client: &mut Client) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(150), client.next()).await;
    assert!(ergebnis.is_err(), "Unerwartete Nachricht: {ergebnis:?}");
}

async fn senden(client: &mut Client, event: &str, data: Value, id: u64) {
    client.send(Envelope::neu(event, data).mit_id(id)).await.unwrap();
}

async fn warten_bis(bedingung: impl Fn() -> bool) {
    for _ in 0..100 {
        if bedingung() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Bedingung nicht erfuellt");
}

#[tokio::test]
async fn tuer_entriegeln_erreicht_dashboard() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;
    let (mut sensor, _) = verbinden(&hub).await;

    senden(&mut sensor, "door_status", json!("Door Unlocked"), 1).await;

    let quittung = empfangen(&mut sensor).await;
    assert_eq!(quittung.event, "ack");
    assert_eq!(quittung.id, Some(1));
    assert_eq!(quittung.data, json!({"status": "received", "code": 200}));

    let ereignis = empfangen(&mut dashboard).await;
    assert_eq!(ereignis.event, "door_status");
    assert_eq!(ereignis.data, json!("Door Unlocked"));

    // Der Sensor ist jetzt Produzent und bekommt keine Broadcasts
    senden(&mut sensor, "message", json!("Object detected"), 2).await;
    assert_eq!(empfangen(&mut sensor).await.id, Some(2));
    assert_eq!(empfangen(&mut dashboard).await.event, "object_detected_status");
    nichts_empfangen(&mut sensor).await;
}

#[tokio::test]
async fn erkanntes_gesicht_mit_bild() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;
    let (mut kamera, _) = verbinden(&hub).await;

    senden(&mut kamera, "face_recognise", json!("alice"), 7).await;
    assert_eq!(empfangen(&mut kamera).await.id, Some(7));

    let gesicht = empfangen(&mut dashboard).await;
    assert_eq!(gesicht.event, "face_recognise");
    assert_eq!(gesicht.data, json!("alice"));

    let bild = empfangen(&mut dashboard).await;
    assert_eq!(bild.event, "image_data");
    assert_eq!(bild.data["name"], json!("alice"));
    let kodiert = bild.data["data"].as_str().unwrap();
    let dekodiert = base64::engine::general_purpose::STANDARD.decode(kodiert).unwrap();
    assert_eq!(dekodiert, b"\xff\xd8alice");
}

#[tokio::test]
async fn gesicht_ohne_bild_wird_trotzdem_zugestellt() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;
    let (mut kamera, _) = verbinden(&hub).await;

    senden(&mut kamera, "face_recognise", json!("bob"), 1).await;
    assert_eq!(empfangen(&mut kamera).await.event, "ack");
    assert_eq!(empfangen(&mut dashboard).await.data, json!("bob"));
    nichts_empfangen(&mut dashboard).await;
}

#[tokio::test]
async fn fehlerhafter_frame_schliesst_die_verbindung_nicht() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;
    let (mut sensor, _) = verbinden(&hub).await;

    // Roher Frame mit ungueltigem JSON
    sensor.get_mut().write_all(&[0, 0, 0, 5]).await.unwrap();
    sensor.get_mut().write_all(b"nope!").await.unwrap();
    senden(&mut sensor, "unbekannt", json!(1), 2).await;
    senden(&mut sensor, "door_status", json!("Door Locked"), 3).await;

    // Nur die gueltige Nachricht wird quittiert
    assert_eq!(empfangen(&mut sensor).await.id, Some(3));
    assert_eq!(empfangen(&mut dashboard).await.data, json!("Door Locked"));
    nichts_empfangen(&mut dashboard).await;
}

#[tokio::test]
async fn zu_grosser_frame_trennt_nur_diese_verbindung() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;
    let (mut stoerer, _) = verbinden(&hub).await;
    let (mut sensor, _) = verbinden(&hub).await;

    stoerer.get_mut().write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    let ende = tokio::time::timeout(Duration::from_secs(2), stoerer.next())
        .await
        .expect("Timeout");
    assert!(ende.is_none() || matches!(ende, Some(Err(_))));

    senden(&mut sensor, "door_status", json!("Door Unlocked"), 1).await;
    assert_eq!(empfangen(&mut sensor).await.event, "ack");
    assert_eq!(empfangen(&mut dashboard).await.data, json!("Door Unlocked"));
}

#[tokio::test]
async fn getrenntes_dashboard_stoert_andere_nicht() {
    let hub = hub_starten().await;
    let (mut bleibt, _) = verbinden(&hub).await;
    let (geht, _) = verbinden(&hub).await;
    let (mut sensor, _) = verbinden(&hub).await;
    assert_eq!(hub.state.registry.anzahl(), 3);

    drop(geht);
    let registry = hub.state.registry.clone();
    warten_bis(|| registry.anzahl() == 2).await;

    senden(&mut sensor, "message", json!("Object detected"), 1).await;
    assert_eq!(empfangen(&mut sensor).await.event, "ack");
    assert_eq!(empfangen(&mut bleibt).await.event, "object_detected_status");
    // Trennung loest keinen Broadcast aus
    nichts_empfangen(&mut bleibt).await;
}

#[tokio::test]
async fn spaet_verbundenes_dashboard_sieht_letzten_zustand() {
    let hub = hub_starten().await;
    let (mut sensor, _) = verbinden(&hub).await;

    senden(&mut sensor, "door_status", json!("Door Unlocked"), 1).await;
    empfangen(&mut sensor).await;
    senden(&mut sensor, "face_recognise", json!("unknown"), 2).await;
    empfangen(&mut sensor).await;

    let (_dashboard, begruessung) = verbinden(&hub).await;
    assert_eq!(begruessung.len(), 3);
    assert_eq!(begruessung[0].data["door_status"], json!("Door Unlocked"));
    assert_eq!(begruessung[0].data["face_recognise"], json!("unknown"));
    assert_eq!(begruessung[1].event, "door_status");
    assert_eq!(begruessung[2].event, "face_recognise");
}

#[tokio::test]
async fn gleichzeitige_dashboards_erhalten_alle_ereignisse_in_reihenfolge() {
    let hub = hub_starten().await;
    let mut dashboards = Vec::new();
    for _ in 0..5 {
        dashboards.push(verbinden(&hub).await.0);
    }
    let (mut sensor, _) = verbinden(&hub).await;

    for (i, text) in ["Door Unlocked", "Door Locked", "Door Unlocked"].iter().enumerate() {
        senden(&mut sensor, "door_status", json!(text), i as u64).await;
        assert_eq!(empfangen(&mut sensor).await.id, Some(i as u64));
    }

    for dashboard in &mut dashboards {
        let mut texte = Vec::new();
        for _ in 0..3 {
            texte.push(empfangen(dashboard).await.data);
        }
        assert_eq!(
            texte,
            vec![json!("Door Unlocked"), json!("Door Locked"), json!("Door Unlocked")]
        );
    }
    assert_eq!(
        hub.state.shared.snapshot().tuerstatus.as_deref(),
        Some("Door Unlocked")
    );
}

#[tokio::test]
async fn shutdown_beendet_verbindungen() {
    let hub = hub_starten().await;
    let (mut dashboard, _) = verbinden(&hub).await;

    hub.state.herunterfahren();

    let ende = tokio::time::timeout(Duration::from_secs(2), dashboard.next())
        .await
        .expect("Verbindung sollte nach Shutdown enden");
    assert!(ende.is_none() || matches!(ende, Some(Err(_))));
    let registry = hub.state.registry.clone();
    warten_bis(|| registry.anzahl() == 0).await;
}
