//! JSON routes.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::AppState;
use super::stream::stream_handler;
use crate::domain::connection::{BrokerCredentials, ConnectionView, OAuthInit, SupportedBroker};
use crate::domain::order::{Order, OrderDraft};
use crate::domain::position::Position;
use crate::domain::shared::{BrokerId, OrderId, UserId};
use crate::error::EngineError;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::stream::HubStats;

/// Create the router with every endpoint.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/brokers", get(list_brokers))
        .route("/connections", get(list_connections))
        .route("/connections/{broker_id}", post(connect))
        .route("/connections/{broker_id}/oauth", post(init_oauth))
        .route("/connections/{broker_id}/disconnect", post(disconnect))
        .route("/connections/{broker_id}/sync", post(sync))
        .route("/connections/{broker_id}/orders", post(place_order))
        .route("/orders/{broker_id}", get(list_orders))
        .route("/orders/{broker_id}/{order_id}", get(get_order))
        .route("/positions/{broker_id}", get(list_positions))
        .route("/stream", get(stream_handler))
        .with_state(state)
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Engine error rendered as `{code, message, details}` with its mapped status.
#[derive(Debug)]
pub struct ApiError(EngineError);

impl ApiError {
    /// The wrapped error.
    #[must_use]
    pub const fn inner(&self) -> &EngineError {
        &self.0
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.code().http_status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        (status, Json(self.0.to_response())).into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| EngineError::invalid_request(e.body_text()).into())
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|e| EngineError::invalid_request(e.body_text()).into())
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// `?userId=` query or `{userId}` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParam {
    /// Requesting user.
    pub user_id: Option<String>,
}

impl UserParam {
    fn require(self) -> Result<UserId, ApiError> {
        match self.user_id {
            Some(raw) if !raw.trim().is_empty() => Ok(UserId::new(raw.trim())),
            _ => Err(EngineError::invalid_request("userId is required").into()),
        }
    }
}

/// Body of `POST /connections/{brokerId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectBody {
    /// Requesting user.
    pub user_id: Option<String>,
    /// Credential fields passed to the broker handshake.
    #[serde(default)]
    pub credentials: BrokerCredentials,
}

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// Always `true`.
    pub ok: bool,
}

/// Body returned by the sync route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// New sync time, `null` if the connection does not exist.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy`, or `shutting_down` once the stream hub has stopped.
    pub status: &'static str,
    /// Engine version.
    pub version: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Live stream subscriptions.
    pub subscribers: usize,
    /// Stored connection records.
    pub connections: usize,
    /// Recorded orders.
    pub orders: usize,
    /// Stream hub counters.
    pub stream: HubStats,
}

// =============================================================================
// Health and Metrics
// =============================================================================

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let shutting_down = state.hub.is_shutdown();
    let response = HealthResponse {
        status: if shutting_down { "shutting_down" } else { "healthy" },
        version: state.version(),
        uptime_secs: state.uptime_secs(),
        current_time: Utc::now(),
        subscribers: state.hub.subscriber_count(),
        connections: state.registry.len(),
        orders: state.engine.order_count(),
        stream: state.hub.stats(),
    };
    let status = if shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    "text/plain; version=0.0.4; charset=utf-8",
                )],
                handle.render(),
            )
        },
    )
}

// =============================================================================
// Connections
// =============================================================================

async fn list_brokers(State(state): State<AppState>) -> Json<&'static [SupportedBroker]> {
    Json(state.registry.supported_brokers())
}

async fn list_connections(
    State(state): State<AppState>,
    params: Result<Query<UserParam>, QueryRejection>,
) -> Result<Json<Vec<ConnectionView>>, ApiError> {
    let user_id = query(params)?.require()?;
    let views = state
        .registry
        .list_connections(&user_id)
        .iter()
        .map(|connection| connection.view())
        .collect();
    Ok(Json(views))
}

async fn init_oauth(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
) -> Result<Json<OAuthInit>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    Ok(Json(state.registry.init_oauth(&broker_id)?))
}

async fn connect(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    payload: Result<Json<ConnectBody>, JsonRejection>,
) -> Result<Json<ConnectionView>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let ConnectBody {
        user_id,
        credentials,
    } = body(payload)?;
    let user_id = UserParam { user_id }.require()?;

    let connection = state
        .registry
        .connect(user_id, &broker_id, credentials)
        .await?;
    Ok(Json(connection.view()))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    payload: Result<Json<UserParam>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let user_id = body(payload)?.require()?;
    state.registry.disconnect(&user_id, &broker_id);
    Ok(Json(AckResponse { ok: true }))
}

async fn sync(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    payload: Result<Json<UserParam>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let user_id = body(payload)?.require()?;
    Ok(Json(SyncResponse {
        last_sync_at: state.registry.sync(&user_id, &broker_id),
    }))
}

// =============================================================================
// Orders and Positions
// =============================================================================

async fn place_order(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    payload: Result<Json<OrderDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let mut draft = payload
        .map(|Json(draft)| draft)
        .map_err(|e| EngineError::invalid_order("body", e.body_text()))?;
    draft.broker_id = Some(broker_id);

    let order = state.engine.place_order(draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    params: Result<Query<UserParam>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let user_id = query(params)?.require()?;
    Ok(Json(state.engine.get_orders(&broker_id, &user_id)))
}

async fn get_order(
    State(state): State<AppState>,
    Path((broker_id, order_id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let order_id = OrderId::new(order_id);
    let order = state.engine.get_order(&order_id)?;
    if order.broker_id != broker_id {
        return Err(EngineError::not_found("order", order_id.as_str()).into());
    }
    Ok(Json(order))
}

async fn list_positions(
    State(state): State<AppState>,
    Path(broker_id): Path<String>,
    params: Result<Query<UserParam>, QueryRejection>,
) -> Result<Json<Vec<Position>>, ApiError> {
    let broker_id = BrokerId::normalized(&broker_id);
    let user_id = query(params)?.require()?;
    Ok(Json(state.engine.get_positions(&broker_id, &user_id)))
}

// =============================================================================
// Tests
// =============================================================================
