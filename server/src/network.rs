//! Server network layer handling WebSocket connections and the event loop

use crate::client_manager::Outbound;
use crate::coordinator::{Coordinator, CoordinatorSettings};
use crate::error::ServerError;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{PlayerId, RoomCode};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Events fed into the coordinator loop by connection tasks and timers
#[derive(Debug)]
pub enum ServerEvent {
    /// Handshake done; the coordinator answers with the assigned id
    Connected {
        sender: Outbound,
        reply: oneshot::Sender<PlayerId>,
    },
    Frame {
        player_id: PlayerId,
        text: String,
    },
    Disconnected {
        player_id: PlayerId,
    },
    SpawnTick {
        room_code: RoomCode,
        generation: u64,
    },
    SpawnRetry {
        room_code: RoomCode,
        generation: u64,
    },
}

/// WebSocket front end plus the single task that owns all room state
pub struct Server {
    listener: TcpListener,
    coordinator: Coordinator,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn bind(addr: &str, settings: CoordinatorSettings) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Server {
            listener,
            coordinator: Coordinator::new(events_tx.clone(), settings),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections and processes events until the process stops.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            mut coordinator,
            events_tx,
            mut events_rx,
        } = self;

        tokio::spawn(Self::accept_loop(listener, events_tx));

        while let Some(event) = events_rx.recv().await {
            coordinator.handle_event(event);
        }

        Err(ServerError::ChannelClosed)
    }

    async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<ServerEvent>) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Incoming connection from {}", addr);
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, events).await {
                            warn!("Connection from {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Runs one connection: handshake, registration, then frames in and
    /// events out until either side closes.
    async fn handle_connection(
        stream: TcpStream,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), ServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        events
            .send(ServerEvent::Connected {
                sender: outbound_tx,
                reply: reply_tx,
            })
            .map_err(|_| ServerError::ChannelClosed)?;
        let player_id = reply_rx.await.map_err(|_| ServerError::ChannelClosed)?;

        let writer_id = player_id.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode event for {}: {}", writer_id, e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::text(text)).await {
                    debug!("Write to {} failed: {}", writer_id, e);
                    break;
                }
            }
        });

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let event = ServerEvent::Frame {
                        player_id: player_id.clone(),
                        text: text.as_str().to_owned(),
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Read from {} failed: {}", player_id, e);
                    break;
                }
            }
        }

        writer.abort();
        let _ = events.send(ServerEvent::Disconnected { player_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ServerMessage;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0", CoordinatorSettings::default())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let result = Server::bind("not an address", CoordinatorSettings::default()).await;
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn test_connected_event_round_trip() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator::new(tx, CoordinatorSettings::default());

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        coordinator.handle_event(ServerEvent::Connected {
            sender: outbound_tx,
            reply: reply_tx,
        });

        let player_id = reply_rx.await.unwrap();
        assert_eq!(
            outbound_rx.recv().await.unwrap(),
            ServerMessage::Connected {
                player_id: player_id.clone()
            }
        );

        coordinator.handle_event(ServerEvent::Disconnected { player_id });
        assert!(coordinator.clients().is_empty());
    }

    #[tokio::test]
    async fn test_connected_with_dropped_reply_is_cleaned_up() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator::new(tx, CoordinatorSettings::default());

        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);
        coordinator.handle_event(ServerEvent::Connected {
            sender: outbound_tx,
            reply: reply_tx,
        });

        assert!(coordinator.clients().is_empty());
    }
}
