//! The axum WebSocket transport.
//!
//! Each upgraded socket is split in two: this task reads frames and feeds
//! them to the service one at a time, and a writer task drains the
//! connection's outbound channel into the socket. The service holds the only
//! sender, so removing the connection from the registry closes the socket.

use std::sync::Arc;

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  http::HeaderMap,
  response::Response,
};
use futures::{SinkExt, StreamExt};
use petcal_core::store::CalendarStore;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
  AppState,
  connections::ConnectionMetadata,
  protocol::{self, Envelope, ServerMessage},
  service::SyncService,
};

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  ws: WebSocketUpgrade,
) -> Response
where
  S: CalendarStore + Clone + 'static,
{
  let metadata = metadata(&headers);
  let service = state.service.clone();
  ws.on_upgrade(move |socket| serve(service, socket, metadata))
}

fn metadata(headers: &HeaderMap) -> ConnectionMetadata {
  let header = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned)
  };
  let remote_addr = header("x-forwarded-for")
    .and_then(|v| v.split(',').next().map(|first| first.trim().to_owned()))
    .or_else(|| header("x-real-ip"));
  ConnectionMetadata { remote_addr, user_agent: header("user-agent") }
}

async fn serve<S>(service: Arc<SyncService<S>>, socket: WebSocket, metadata: ConnectionMetadata)
where
  S: CalendarStore + 'static,
{
  let (mut sink, mut stream) = socket.split();
  let (tx, mut rx) = mpsc::unbounded_channel::<Envelope<ServerMessage>>();

  let id = match service.connect(metadata, tx) {
    Ok(id) => id,
    Err(e) => {
      debug!(error = %e, "refusing connection");
      let _ = sink.send(Message::Close(None)).await;
      return;
    }
  };

  let mut writer = tokio::spawn(async move {
    while let Some(envelope) = rx.recv().await {
      let text = match protocol::encode(&envelope) {
        Ok(text) => text,
        Err(e) => {
          warn!(error = %e, "failed to encode outbound message");
          continue;
        }
      };
      if sink.send(Message::Text(text.into())).await.is_err() {
        return;
      }
    }
    let _ = sink.send(Message::Close(None)).await;
  });

  loop {
    tokio::select! {
      frame = stream.next() => match frame {
        Some(Ok(Message::Text(text))) => service.handle_text(id, text.as_str()).await,
        Some(Ok(Message::Binary(bytes))) => {
          service.handle_text(id, &String::from_utf8_lossy(&bytes)).await
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
          service.hub().connections.touch(id);
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Err(e)) => {
          debug!(connection_id = %id, error = %e, "socket error");
          break;
        }
      },
      _ = &mut writer => break,
    }
  }

  service.disconnect(id, "socket closed");
}
