//! TCP-Listener – Akzeptiert Geraete-Verbindungen
//!
//! Der `RelayTcpServer` startet fuer jede eingehende Verbindung einen
//! eigenen tokio-Task mit einer `ClientConnection`.

use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::connection::ClientConnection;
use crate::error::RelayResult;
use crate::lifecycle::SessionLifecycle;

/// TCP-Server fuer Produzenten und Dashboards mit Frame-Protokoll
pub struct RelayTcpServer {
    lifecycle: SessionLifecycle,
    listener: TcpListener,
}

impl RelayTcpServer {
    /// Bindet den Socket
    pub async fn binden(lifecycle: SessionLifecycle, bind_addr: SocketAddr) -> RelayResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self::mit_listener(lifecycle, listener))
    }

    /// Verwendet einen bereits gebundenen Listener
    pub fn mit_listener(lifecycle: SessionLifecycle, listener: TcpListener) -> Self {
        Self {
            lifecycle,
            listener,
        }
    }

    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Akzeptiert Verbindungen bis zum Shutdown-Signal des Hubs
    pub async fn starten(self) -> RelayResult<()> {
        let mut shutdown_rx = self.lifecycle.state().shutdown_abonnieren();
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "TCP Relay-Server gestartet");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            let verbindung = ClientConnection::neu(self.lifecycle.clone(), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("TCP Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Relay-Server gestoppt");
        Ok(())
    }
}
