//! TCP-Client fuer Produzenten
//!
//! Sendet Envelopes mit fortlaufender ID an den Hub und wartet begrenzt auf
//! die passende Quittung. Eine fehlende Quittung wird nur geloggt: sie ist
//! rein informativ und wird nie wiederholt.

use async_trait::async_trait;
use doorhub_protocol::{wire::FrameCodec, Ack, Envelope};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::error::{DoorError, DoorResult};
use crate::session::EreignisSenke;

/// Standard-Wartezeit auf eine Quittung
pub const STANDARD_QUITTUNGS_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ProducerClient {
    framed: Framed<TcpStream, FrameCodec>,
    naechste_id: u64,
    quittungs_timeout: Duration,
}

impl ProducerClient {
    /// Verbindet sich mit dem TCP-Port des Hubs
    pub async fn verbinden(addr: impl ToSocketAddrs) -> DoorResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::info!(peer = ?stream.peer_addr().ok(), "Mit Hub verbunden");
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
            naechste_id: 1,
            quittungs_timeout: STANDARD_QUITTUNGS_TIMEOUT,
        })
    }

    pub fn mit_quittungs_timeout(mut self, timeout: Duration) -> Self {
        self.quittungs_timeout = timeout;
        self
    }

    /// Sendet einen Envelope und wartet auf die Quittung
    ///
    /// `Ok(None)` wenn innerhalb des Timeouts keine Quittung kam.
    pub async fn senden_und_warten(&mut self, envelope: Envelope) -> DoorResult<Option<Ack>> {
        let id = self.naechste_id;
        self.naechste_id += 1;
        let event = envelope.event.clone();

        self.framed.send(envelope.mit_id(id)).await?;

        let frist = Instant::now() + self.quittungs_timeout;
        loop {
            let frame = match tokio::time::timeout_at(frist, self.framed.next()).await {
                Ok(Some(frame)) => frame?,
                Ok(None) => return Err(DoorError::VerbindungGetrennt),
                Err(_) => {
                    tracing::warn!(event = %event, id = id, "Keine Quittung vom Hub");
                    return Ok(None);
                }
            };

            // Begruessung und Broadcasts sind fuer Produzenten uninteressant
            let antwort: Envelope = match serde_json::from_slice(&frame) {
                Ok(env) => env,
                Err(e) => {
                    tracing::debug!(fehler = %e, "Unlesbarer Frame vom Hub ignoriert");
                    continue;
                }
            };
            if !antwort.ist_quittung() || antwort.id != Some(id) {
                tracing::trace!(event = %antwort.event, "Nachricht ignoriert");
                continue;
            }

            return match serde_json::from_value::<Ack>(antwort.data) {
                Ok(ack) => {
                    if !ack.ist_erfolgreich() {
                        tracing::warn!(event = %event, status = %ack.status, code = ack.code, "Hub meldet Fehler");
                    }
                    Ok(Some(ack))
                }
                Err(e) => {
                    tracing::warn!(fehler = %e, "Quittung nicht lesbar");
                    Ok(None)
                }
            };
        }
    }
}

#[async_trait]
impl EreignisSenke for ProducerClient {
    async fn senden(&mut self, envelope: Envelope) -> DoorResult<()> {
        self.senden_und_warten(envelope).await.map(|_| ())
    }
}
