//! WebSocket endpoint: one authenticated socket per broker session.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use campus_messaging::{Connection, Outbound, Session, TransportError};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::state::GatewayState;

/// How long a finished session waits for its writer to flush before dropping it
const WRITER_GRACE: Duration = Duration::from_secs(5);

pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

/// Upgrade an authenticated request. Token failures are rejected with 401
/// before anything is registered.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    AuthUser(session): AuthUser,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, session: Session) {
    let (sink, stream) = socket.split();
    let (connection, outbound) = Connection::new(session.user_id, state.outbound_buffer);

    let mut writer = tokio::spawn(write_outbound(sink, outbound, session.user_id));

    let inbound = stream.filter_map(|frame| futures_util::future::ready(inbound_text(frame)));
    state.broker.serve(session, connection, inbound).await;

    // the queue closes once the session has released its handles
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        debug!(user_id = %session.user_id, "writer did not drain in time");
        writer.abort();
    }
}

/// Drain the connection queue onto the socket until it closes, a write
/// fails, or a close is requested.
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    user_id: Uuid,
) {
    while let Some(next) = outbound.recv().await {
        let message = match next {
            Outbound::Frame(frame) => match frame.to_json() {
                Ok(json) => Message::Text(json),
                Err(error) => {
                    warn!(user_id = %user_id, %error, "failed to encode frame");
                    continue;
                }
            },
            Outbound::Ping => Message::Ping(Vec::new()),
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(error) = sink.send(message).await {
            debug!(user_id = %user_id, %error, "socket write failed");
            break;
        }
    }
}

/// Text frames go to the broker; close and read errors end the session;
/// everything else (binary, ping, pong) is ignored.
fn inbound_text(frame: Result<Message, axum::Error>) -> Option<Result<String, TransportError>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
        Ok(_) => None,
        Err(error) => Some(Err(TransportError::Io(error.to_string()))),
    }
}
