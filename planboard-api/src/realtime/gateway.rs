/// WebSocket gateway endpoints
///
/// Browsers cannot set headers on a WebSocket handshake, so the access
/// token travels in the `token` query parameter. It is validated and checked
/// against the blacklist before the upgrade; a bad token gets a plain 401
/// and no socket.
///
/// A session forwards hub frames to the socket until either side closes.
/// Incoming text and binary frames are ignored; pings are answered by the
/// WebSocket layer.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use planboard_shared::auth::middleware::{authenticate_token, AuthContext, AuthError};
use serde::Deserialize;

use super::hub::ConnectionHub;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// `GET /ws/activity-logs?token=<access>`
///
/// Any authenticated user may connect; only admin connections are sent
/// activity log rows.
pub async fn activity_logs_ws(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let auth = authenticate_query(&state, &query).await?;
    upgrade(ws, state.realtime.activity.clone(), auth)
}

/// `GET /ws/notifications?token=<access>`
pub async fn notifications_ws(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let auth = authenticate_query(&state, &query).await?;
    upgrade(ws, state.realtime.notifications.clone(), auth)
}

async fn authenticate_query(state: &AppState, query: &GatewayQuery) -> ApiResult<AuthContext> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredentials)?;

    let (auth, _) = authenticate_token(token, state.jwt_secret(), &state.blacklist).await?;
    Ok(auth)
}

fn upgrade(
    ws: Option<WebSocketUpgrade>,
    hub: ConnectionHub,
    auth: AuthContext,
) -> ApiResult<Response> {
    let ws = ws.ok_or_else(|| ApiError::BadRequest("Expected a WebSocket upgrade".to_string()))?;
    Ok(ws.on_upgrade(move |socket| run_session(socket, hub, auth)))
}

async fn run_session(socket: WebSocket, hub: ConnectionHub, auth: AuthContext) {
    let (conn_id, mut frames) = hub.register(auth.user_id, auth.is_admin()).await;
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(conn_id).await;
}
