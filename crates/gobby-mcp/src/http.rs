//! The HTTP/WebSocket surface: REST endpoints for the host UI and CLI
//! adapters that prefer HTTP over stdio, plus the single WebSocket every
//! client subscribes events from. Mirrors the hub's own shape — one small
//! set of generic routes rather than one per namespace — since the hub
//! already does the tool-name dispatch.

use crate::hub::McpHub;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use gobby_events::{relay_to_client, EventBus, EventTypeFilter};
use gobby_hooks::HookDispatcher;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct AppState {
    pub hub: Arc<McpHub>,
    pub dispatcher: Arc<HookDispatcher>,
    pub bus: EventBus,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/hooks", post(handle_hook))
        .route("/mcp/servers", get(list_servers))
        .route("/mcp/:server/tools", get(list_tools))
        .route("/mcp/:server/:tool/schema", get(get_tool_schema))
        .route("/mcp/:server/:tool/call", post(call_tool))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// The wire CLI adapters use on machines where IPC is easier over HTTP
/// than the native hook transport; body is a `HookEvent`, response a
/// `HookResponse`.
async fn handle_hook(State(state): State<Arc<AppState>>, Json(event): Json<gobby_hooks::HookEvent>) -> impl IntoResponse {
    let response = state.dispatcher.dispatch(event).await;
    Json(response)
}

async fn list_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.hub.list_mcp_servers())
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: String,
}

async fn list_tools(State(state): State<Arc<AppState>>, Path(server): Path<String>, axum::extract::Query(q): axum::extract::Query<SessionQuery>) -> impl IntoResponse {
    match state.hub.list_tools(&q.session_id, &server) {
        Ok(tools) => Json(tools).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_tool_schema(State(state): State<Arc<AppState>>, Path((server, tool)): Path<(String, String)>) -> impl IntoResponse {
    match state.hub.get_tool_schema(&server, &tool) {
        Ok(schema) => Json(schema).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
struct CallToolBody {
    session_id: String,
    #[serde(default)]
    args: Value,
}

async fn call_tool(State(state): State<Arc<AppState>>, Path((server, tool)): Path<(String, String)>, Json(body): Json<CallToolBody>) -> impl IntoResponse {
    match state.hub.call_tool(&body.session_id, &server, &tool, body.args).await {
        Ok(result) => Json(result).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: gobby_core::GobbyError) -> axum::response::Response {
    let status = match error.exit_code() {
        3 => axum::http::StatusCode::NOT_FOUND,
        2 => axum::http::StatusCode::CONFLICT,
        1 => axum::http::StatusCode::FORBIDDEN,
        4 => axum::http::StatusCode::REQUEST_TIMEOUT,
        _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": error.to_string()}))).into_response()
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { events: Vec<String> },
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Until the client sends `{"type":"subscribe","events":[...]}` the relay
/// runs with `EventTypeFilter::all()`; a later subscribe message narrows it.
/// The actual fan-out and lag handling lives in `gobby_events::relay_to_client`,
/// shared with the webhook sink.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut rx) = mpsc::channel(64);
    let bus = state.bus.clone();
    let mut relay = tokio::spawn(async move { relay_to_client(&bus, EventTypeFilter::all(), tx).await });

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Subscribe { events }) = serde_json::from_str(&text) {
                            relay.abort();
                            let (new_tx, new_rx) = mpsc::channel(64);
                            rx = new_rx;
                            let bus = state.bus.clone();
                            relay = tokio::spawn(async move { relay_to_client(&bus, EventTypeFilter::only(events), new_tx).await });
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let Ok(payload) = serde_json::to_string(&event) else { continue };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    relay.abort();
}
