use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use konect_types::events::{ClientCommand, decode_message};
use konect_types::{Message, RoomId};

use crate::error::ClientError;

/// Outbound half of an open push connection: one JSON text frame per item.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;

/// Inbound half: text frames until the peer closes (`None`) or the transport
/// fails (`Err`).
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Opens the transport for one room's push channel.
pub trait PushConnector: Send + Sync + 'static {
    fn open(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<(FrameSink, FrameStream), ClientError>> + Send;
}

/// WebSocket transport at `<server>/ws/{room_id}`.
pub struct WsConnector {
    server_url: Url,
}

impl WsConnector {
    pub fn new(server_url: Url) -> Self {
        Self { server_url }
    }
}

impl PushConnector for WsConnector {
    async fn open(&self, room_id: &RoomId) -> Result<(FrameSink, FrameStream), ClientError> {
        let url = crate::config::channel_url(&self.server_url, room_id)
            .map_err(|e| ClientError::Channel(e.to_string()))?;

        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (ws_tx, ws_rx) = ws_stream.split();

        let sink = ws_tx
            .sink_map_err(ClientError::from)
            .with(|text: String| ready(Ok::<_, ClientError>(WsMessage::Text(text.into()))));

        let stream = ws_rx.filter_map(|msg| {
            ready(match msg {
                Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(data)) => {
                    warn!("Ignoring {} byte binary frame", data.len());
                    None
                }
                // Ping/Pong/Close are handled by tungstenite itself
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
    Joined(RoomId),
}

/// Delivered from the channel to its owner. `generation` identifies which
/// `connect` call produced the event.
#[derive(Debug)]
pub enum ChannelEvent {
    Message {
        generation: u64,
        message: Message,
    },
    /// The peer closed the channel or the transport failed. Not sent for a
    /// local `close`.
    Disconnected {
        generation: u64,
        room_id: RoomId,
        error: Option<ClientError>,
    },
}

struct Shared {
    generation: u64,
    state: ChannelState,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Live {
    room_id: RoomId,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// The client's single push channel. At most one connection exists at a
/// time; `connect` always closes the previous one first. Nothing reconnects
/// automatically.
pub struct RealtimeChannel<C> {
    connector: C,
    shared: Arc<Mutex<Shared>>,
    live: Option<Live>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl<C: PushConnector> RealtimeChannel<C> {
    pub fn new(connector: C) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Self {
            connector,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                state: ChannelState::Closed,
            })),
            live: None,
            events_tx,
        };
        (channel, events_rx)
    }

    pub fn state(&self) -> ChannelState {
        lock(&self.shared).state.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.shared).generation
    }

    fn set_state(&self, generation: u64, state: ChannelState) {
        let mut shared = lock(&self.shared);
        if shared.generation == generation {
            shared.state = state;
        }
    }

    /// Open a channel for `room_id` and join it. Any existing channel, for
    /// this room or another, is closed first. On failure the state is
    /// `Closed` and the error is returned; there is no retry.
    pub async fn connect(&mut self, room_id: RoomId) -> Result<(), ClientError> {
        self.close();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = ChannelState::Connecting;
            shared.generation
        };

        info!("Connecting push channel for room {}", room_id);
        let (sink, stream) = match self.connector.open(&room_id).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!("Push channel for room {} failed to open: {}", room_id, e);
                self.set_state(generation, ChannelState::Closed);
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_channel_loop(
            sink,
            stream,
            outbound_rx,
            self.events_tx.clone(),
            self.shared.clone(),
            generation,
            room_id.clone(),
        ));
        self.live = Some(Live {
            room_id: room_id.clone(),
            outbound: outbound_tx,
            task,
        });
        self.set_state(generation, ChannelState::Open);

        self.send(&ClientCommand::JoinRoom {
            room_id: room_id.clone(),
        });
        info!("Joined room {} on push channel", room_id);
        self.set_state(generation, ChannelState::Joined(room_id));
        Ok(())
    }

    /// Transmit `command` if the channel is open. Otherwise the command is
    /// dropped without error.
    pub fn send(&self, command: &ClientCommand) {
        let state = self.state();
        let live = match (&state, &self.live) {
            (ChannelState::Open | ChannelState::Joined(_), Some(live)) => live,
            _ => {
                debug!("Dropping {:?} on {:?} channel", command, state);
                return;
            }
        };

        match serde_json::to_string(command) {
            Ok(text) => {
                if live.outbound.send(text).is_err() {
                    debug!("Channel loop for room {} already gone", live.room_id);
                }
            }
            Err(e) => warn!("Failed to encode {:?}: {}", command, e),
        }
    }

    /// Go to `Closed` from any state. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(live) = self.live.take() {
            info!("Closing push channel for room {}", live.room_id);
            // Dropping the sender ends the loop, which closes the transport.
            drop(live.outbound);
        }

        let mut shared = lock(&self.shared);
        if shared.state != ChannelState::Closed {
            shared.generation += 1;
            shared.state = ChannelState::Closed;
        }
    }
}

impl<C> Drop for RealtimeChannel<C> {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.task.abort();
        }
    }
}

/// Forward queued commands to the transport and decoded frames to the owner
/// until either side ends. Frames that do not decode are logged and skipped.
async fn run_channel_loop(
    mut sink: FrameSink,
    mut stream: FrameStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    room_id: RoomId,
) {
    let error = loop {
        // Inbound first: a peer that hung up is reported as a clean close
        // even when a queued command would fail on the dead transport.
        tokio::select! {
            biased;

            frame = stream.next() => {
                match frame {
                    Some(Ok(text)) => match decode_message(&text) {
                        Ok(message) => {
                            if lock(&shared).generation != generation {
                                debug!("Discarding frame {} from superseded channel", message.id);
                                continue;
                            }
                            let _ = events.send(ChannelEvent::Message { generation, message });
                        }
                        Err(e) => {
                            let raw: String = text.chars().take(200).collect();
                            warn!("Dropping frame on room {} channel: {} -- raw: {}", room_id, e, raw);
                        }
                    },
                    Some(Err(e)) => break Some(e),
                    None => break None,
                }
            }
            cmd = outbound.recv() => {
                match cmd {
                    Some(text) => {
                        if let Err(e) = sink.send(text).await {
                            break Some(e);
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        debug!("Push channel loop for room {} stopped", room_id);
                        return;
                    }
                }
            }
        }
    };

    let current = {
        let mut shared = lock(&shared);
        if shared.generation == generation {
            shared.state = ChannelState::Closed;
            true
        } else {
            false
        }
    };
    if !current {
        return;
    }

    match &error {
        Some(e) => warn!("Push channel for room {} failed: {}", room_id, e),
        None => info!("Push channel for room {} closed by server", room_id),
    }
    let _ = events.send(ChannelEvent::Disconnected {
        generation,
        room_id,
        error,
    });
}
