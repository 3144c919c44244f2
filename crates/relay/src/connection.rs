//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung laeuft in einem eigenen tokio-Task. Der Task liest
//! Frames, reicht sie an den `SessionLifecycle` weiter und schreibt alles,
//! was in der Send-Queue der Verbindung landet, zurueck auf den Socket.
//!
//! Eine fehlerhafte Nachricht beendet die Verbindung nicht. Ein zu grosser
//! Frame, ein Lesefehler oder ein Schreib-Timeout schon.

use doorhub_protocol::{wire::FrameCodec, Envelope};
use futures_util::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;

use crate::error::{RelayError, RelayResult};
use crate::lifecycle::{GeoeffneteVerbindung, SessionLifecycle};

/// Schreibt einen Envelope mit Timeout
pub(crate) async fn senden_mit_timeout<S>(
    sink: &mut S,
    envelope: Envelope,
    timeout: Duration,
) -> RelayResult<()>
where
    S: Sink<Envelope, Error = std::io::Error> + Unpin,
{
    match tokio::time::timeout(timeout, sink.send(envelope)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RelayError::Io(e)),
        Err(_) => Err(RelayError::SchreibTimeout(timeout)),
    }
}

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    lifecycle: SessionLifecycle,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    pub fn neu(lifecycle: SessionLifecycle, peer_addr: SocketAddr) -> Self {
        Self {
            lifecycle,
            peer_addr,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Gegenstelle trennt, die Verbindung aus der Registry
    /// entfernt wird oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let config = self.lifecycle.config();
        let schreib_timeout = config.schreib_timeout;
        let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_groesse));

        let GeoeffneteVerbindung { id, mut ausgang } =
            match self.lifecycle.verbindung_oeffnen(&peer_addr.to_string()) {
                Ok(offen) => offen,
                Err(e) => {
                    tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindung abgelehnt");
                    return;
                }
            };

        loop {
            tokio::select! {
                // Eingehender Frame vom Geraet
                frame = framed.next() => {
                    match frame {
                        Some(Ok(roh)) => {
                            tracing::trace!(verbindung = %id, bytes = roh.len(), "Frame empfangen");
                            if let Some(quittung) = self.lifecycle.nachricht_verarbeiten(id, &roh).await {
                                if let Err(e) = senden_mit_timeout(&mut framed, quittung, schreib_timeout).await {
                                    tracing::warn!(verbindung = %id, fehler = %e, "Quittung nicht gesendet");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(verbindung = %id, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(verbindung = %id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der Send-Queue
                ausgehend = ausgang.recv() => {
                    match ausgehend {
                        Some(envelope) => {
                            if let Err(e) = senden_mit_timeout(&mut framed, envelope, schreib_timeout).await {
                                tracing::warn!(verbindung = %id, fehler = %e, "Senden fehlgeschlagen");
                                break;
                            }
                        }
                        None => {
                            tracing::debug!(verbindung = %id, "Send-Queue geschlossen");
                            break;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(verbindung = %id, "Shutdown, Verbindung wird beendet");
                        break;
                    }
                }
            }
        }

        self.lifecycle.verbindung_schliessen(&id);
    }
}
