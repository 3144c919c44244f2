//! WebSocket-Transport fuer Dashboards
//!
//! `GET /ws` wird zu einer WebSocket-Verbindung. Jeder Text-Frame (oder
//! Binary-Frame mit JSON) ist ein Envelope, ausgehende Envelopes werden als
//! Text-Frames geschrieben. Ablauf und Fehlerverhalten entsprechen der
//! TCP-Verbindung.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use doorhub_protocol::Envelope;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};
use crate::lifecycle::{GeoeffneteVerbindung, SessionLifecycle};

/// `GET /ws` – Upgrade auf eine WebSocket-Verbindung
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(lifecycle): State<SessionLifecycle>,
) -> impl IntoResponse {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "ws:unbekannt".to_string());
    let max_groesse = lifecycle.config().max_frame_groesse;

    ws.max_message_size(max_groesse)
        .on_upgrade(move |socket| ws_verbindung(socket, peer, lifecycle))
}

async fn senden(socket: &mut WebSocket, envelope: &Envelope, timeout: Duration) -> RelayResult<()> {
    let text = serde_json::to_string(envelope)
        .map_err(|e| RelayError::WebSocket(format!("Serialisierung fehlgeschlagen: {e}")))?;
    match tokio::time::timeout(timeout, socket.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RelayError::WebSocket(e.to_string())),
        Err(_) => Err(RelayError::SchreibTimeout(timeout)),
    }
}

/// Lebenszyklus einer WebSocket-Verbindung
async fn ws_verbindung(mut socket: WebSocket, peer: String, lifecycle: SessionLifecycle) {
    let schreib_timeout = lifecycle.config().schreib_timeout;
    let mut shutdown_rx = lifecycle.state().shutdown_abonnieren();

    let GeoeffneteVerbindung { id, mut ausgang } = match lifecycle.verbindung_oeffnen(&peer) {
        Ok(offen) => offen,
        Err(e) => {
            tracing::warn!(peer = %peer, fehler = %e, "WebSocket-Verbindung abgelehnt");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            ausgehend = ausgang.recv() => {
                match ausgehend {
                    Some(envelope) => {
                        if let Err(e) = senden(&mut socket, &envelope, schreib_timeout).await {
                            tracing::debug!(verbindung = %id, fehler = %e, "WebSocket-Senden fehlgeschlagen");
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(verbindung = %id, "Send-Queue geschlossen");
                        break;
                    }
                }
            }

            nachricht = socket.recv() => {
                let roh = match nachricht {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(daten))) => daten.to_vec(),
                    Some(Ok(Message::Ping(daten))) => {
                        if socket.send(Message::Pong(daten)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(verbindung = %id, "WebSocket vom Client getrennt");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(verbindung = %id, fehler = %e, "WebSocket-Fehler");
                        break;
                    }
                };

                if let Some(quittung) = lifecycle.nachricht_verarbeiten(id, &roh).await {
                    if let Err(e) = senden(&mut socket, &quittung, schreib_timeout).await {
                        tracing::debug!(verbindung = %id, fehler = %e, "Quittung nicht gesendet");
                        break;
                    }
                }
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    lifecycle.verbindung_schliessen(&id);
}
