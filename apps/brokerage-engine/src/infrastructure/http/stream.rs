//! WebSocket stream endpoint.
//!
//! `GET /stream?userId=&brokerId=&symbols=A,B` upgrades to a WebSocket. The
//! socket receives one `subscribed` frame, then `tick` frames until either
//! side closes:
//!
//! ```text
//! StreamHub task ──try_send──► mpsc (client_buffer) ──► writer ──► socket
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Query, State, rejection::QueryRejection};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::routes::ApiError;
use super::state::AppState;
use crate::domain::market::PriceTick;
use crate::domain::shared::{BrokerId, ClientId, Symbol, UserId};
use crate::error::{EngineError, ErrorResponse};
use crate::infrastructure::stream::{CloseReason, StreamHub, StreamRequest};

/// Query of the stream endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    /// Requesting user.
    pub user_id: Option<String>,
    /// Broker context.
    pub broker_id: Option<String>,
    /// Comma-separated symbols.
    pub symbols: Option<String>,
}

impl StreamQuery {
    fn into_request(self) -> Result<StreamRequest, EngineError> {
        let user_id = self
            .user_id
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EngineError::invalid_request("userId is required"))?;
        let broker_id = self
            .broker_id
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EngineError::invalid_request("brokerId is required"))?;

        let request = StreamRequest::from_csv(
            UserId::new(user_id.trim()),
            BrokerId::normalized(&broker_id),
            self.symbols.as_deref().unwrap_or_default(),
        );
        if request.symbols.is_empty() {
            return Err(EngineError::invalid_request(
                "at least one symbol is required to stream",
            ));
        }
        Ok(request)
    }
}

/// Server-to-client frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StreamFrame {
    /// Subscription accepted.
    Subscribed {
        /// Subscription id.
        client_id: ClientId,
        /// Streamed symbols.
        symbols: Vec<Symbol>,
        /// Push cadence in milliseconds.
        interval_ms: u64,
    },
    /// Price update.
    Tick(PriceTick),
    /// Subscription refused.
    Error(ErrorResponse),
}

pub(super) async fn stream_handler(
    State(state): State<AppState>,
    params: Result<Query<StreamQuery>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = params.map_err(|e| EngineError::invalid_request(e.body_text()))?;
    let request = query.into_request()?;
    let upgrade = upgrade.map_err(|e| {
        EngineError::invalid_request(format!("websocket upgrade required: {}", e.body_text()))
    })?;

    let hub = Arc::clone(&state.hub);
    Ok(upgrade
        .on_upgrade(move |socket| serve_socket(hub, request, socket))
        .into_response())
}

async fn serve_socket(hub: Arc<StreamHub>, request: StreamRequest, socket: WebSocket) {
    let config = *hub.config();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<PriceTick>(config.client_buffer);
    let symbols = request.symbols.clone();

    let client_id = match hub.open(request, tx) {
        Ok(id) => id,
        Err(e) => {
            let _ = send_frame(&mut sender, &StreamFrame::Error(e.to_response()), config.write_timeout).await;
            let _ = sender.close().await;
            return;
        }
    };

    let subscribed = StreamFrame::Subscribed {
        client_id: client_id.clone(),
        symbols,
        interval_ms: u64::try_from(config.tick_interval.as_millis()).unwrap_or(u64::MAX),
    };

    let reason = match send_frame(&mut sender, &subscribed, config.write_timeout).await {
        Err(reason) => Some(reason),
        Ok(()) => loop {
            tokio::select! {
                tick = rx.recv() => match tick {
                    Some(tick) => {
                        if let Err(reason) =
                            send_frame(&mut sender, &StreamFrame::Tick(tick), config.write_timeout).await
                        {
                            break Some(reason);
                        }
                    }
                    // Hub released the subscription.
                    None => break None,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break Some(CloseReason::TransportClosed),
                    Some(Err(_)) => break Some(CloseReason::TransportError),
                    Some(Ok(_)) => {}
                },
            }
        },
    };

    if let Some(reason) = reason {
        hub.close_with(&client_id, reason);
    }
    let _ = sender.close().await;
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &StreamFrame,
    write_timeout: Duration,
) -> Result<(), CloseReason> {
    let text = serde_json::to_string(frame).map_err(|_| CloseReason::TransportError)?;
    match tokio::time::timeout(write_timeout, sender.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(CloseReason::TransportClosed),
        Err(_) => {
            tracing::warn!(timeout_ms = write_timeout.as_millis(), "Stream write timed out");
            Err(CloseReason::TransportError)
        }
    }
}
