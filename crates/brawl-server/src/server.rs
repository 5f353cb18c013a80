//! WebSocket server and connection handling.

use std::net::SocketAddr;
use std::sync::Arc;

use brawl_core::{
    ActionRequest, ClientEvent, ConnectionId, Engine, JoinRequest, ReaperConfig, ServerEvent,
    Transport,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Routes engine events onto per-connection channels.
#[derive(Default)]
pub struct WsTransport {
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl WsTransport {
    fn register(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(conn, tx);
        rx
    }

    fn unregister(&self, conn: ConnectionId) {
        self.senders.remove(&conn);
    }
}

impl Transport for WsTransport {
    fn send(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            // A closed channel just means the connection is already gone;
            // the fight record stays valid for a reconnect.
            let _ = sender.send(event);
        }
    }
}

/// Server state shared across all connections.
pub struct ServerState {
    pub transport: Arc<WsTransport>,
    pub engine: Engine<WsTransport>,
}

impl ServerState {
    pub fn new(config: ReaperConfig) -> Self {
        let transport = Arc::new(WsTransport::default());
        let engine = Engine::new(Arc::clone(&transport), config);
        Self { transport, engine }
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Brawl server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a connection ID and a channel for outgoing events
    let conn_id: ConnectionId = Uuid::new_v4();
    let mut rx = state.transport.register(conn_id);

    // Spawn task to forward engine events to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&event) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(event) = serde_json::from_str::<ClientEvent>(&text) {
                    dispatch(conn_id, event, &state);
                } else {
                    warn!("Invalid message from {}: {}", conn_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", conn_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.transport.send(conn_id, ServerEvent::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", conn_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    state.engine.handle_disconnect(conn_id);
    state.transport.unregister(conn_id);
    send_task.abort();

    info!("Connection closed for {}", conn_id);
    Ok(())
}

/// Hand a client event to the engine.
fn dispatch(conn: ConnectionId, event: ClientEvent, state: &ServerState) {
    match event {
        ClientEvent::Join {
            fight_id,
            fighter_id,
            display_name,
            character,
        } => {
            state.engine.handle_join(JoinRequest {
                fight_id,
                fighter_id,
                display_name,
                character,
                connection: conn,
            });
        }

        ClientEvent::Action {
            fight_id,
            fighter_id,
            action,
            attack_type,
            damage,
            blocking,
        } => {
            state.engine.handle_action(ActionRequest {
                fight_id,
                fighter_id,
                action,
                attack_type,
                damage,
                blocking,
            });
        }

        ClientEvent::Ping => {
            state.transport.send(conn, ServerEvent::Pong);
        }
    }
}
