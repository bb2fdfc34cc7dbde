//! HTTP and WebSocket surface.
//!
//! Mutation handlers call the store, answer with an [`ApiResponse`] envelope
//! and hand exactly one [`MutationEvent`] to the broadcaster. Store failures
//! stay inside the envelope; broadcast problems never reach the caller.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::select;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    config::FeedConfig,
    coordinator::Broadcaster,
    event::{Action, MutationEvent, UserPayload},
    registry::{Inbox, SubscriberId},
    store::{parse_id, StoreError, UserStore},
};

/// Uniform response body for every API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub message: String,
    pub error: bool,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            message: "ok".to_string(),
            error: false,
            data: Some(data),
        }
    }

    pub fn failed(err: &StoreError, data: Option<T>) -> Self {
        Self {
            message: err.to_string(),
            error: true,
            data,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub config: Arc<FeedConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/hello/:name", get(say_hello))
        .route("/api/getAll", get(list_users))
        .route("/api/insert", post(insert_user))
        .route("/api/update", post(update_user))
        .route("/api/delete", post(delete_user))
        .route("/ws", get(subscribe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

async fn say_hello(Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "message": format!("Hello {name}") }))
}

async fn list_users(State(state): State<AppState>) -> Json<ApiResponse<Vec<UserPayload>>> {
    match state.store.list() {
        Ok(users) => Json(ApiResponse::ok(
            users.into_iter().map(UserPayload::from).collect(),
        )),
        Err(err) => {
            warn!(error = %err, "failed to list users");
            Json(ApiResponse::failed(&err, None))
        }
    }
}

async fn insert_user(
    State(state): State<AppState>,
    Json(body): Json<UserPayload>,
) -> Json<ApiResponse<UserPayload>> {
    let outcome = required(&body.name, "name")
        .and_then(|name| state.store.insert(name))
        .map(UserPayload::from);
    // A rejected insert never received an id; report only what was submitted.
    let submitted = UserPayload {
        id: None,
        name: body.name,
    };
    complete_mutation(&state, Action::Create, submitted, outcome).await
}

async fn update_user(
    State(state): State<AppState>,
    Json(body): Json<UserPayload>,
) -> Json<ApiResponse<UserPayload>> {
    let outcome = apply_update(state.store.as_ref(), &body);
    complete_mutation(&state, Action::Update, body, outcome).await
}

async fn delete_user(
    State(state): State<AppState>,
    Json(body): Json<UserPayload>,
) -> Json<ApiResponse<UserPayload>> {
    let outcome = apply_delete(state.store.as_ref(), &body);
    complete_mutation(&state, Action::Delete, body, outcome).await
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, StoreError> {
    field.as_deref().ok_or(StoreError::MissingField(name))
}

fn apply_update(store: &dyn UserStore, body: &UserPayload) -> Result<UserPayload, StoreError> {
    let id = parse_id(required(&body.id, "id")?)?;
    let name = required(&body.name, "name")?;
    store.lookup(id)?;
    store.update(id, name).map(UserPayload::from)
}

fn apply_delete(store: &dyn UserStore, body: &UserPayload) -> Result<UserPayload, StoreError> {
    let id = parse_id(required(&body.id, "id")?)?;
    let removed = store.delete(id)?;
    Ok(removed
        .map(UserPayload::from)
        .unwrap_or_else(|| body.clone()))
}

/// Builds the envelope and, subject to the broadcast policy, announces the
/// mutation with the same payload the caller receives.
async fn complete_mutation(
    state: &AppState,
    action: Action,
    submitted: UserPayload,
    outcome: Result<UserPayload, StoreError>,
) -> Json<ApiResponse<UserPayload>> {
    let (payload, response, succeeded) = match outcome {
        Ok(payload) => (payload.clone(), ApiResponse::ok(payload), true),
        Err(err) => {
            warn!(%action, error = %err, "store operation failed");
            let response = ApiResponse::failed(&err, Some(submitted.clone()));
            (submitted, response, false)
        }
    };

    if state.config.broadcast_policy.should_broadcast(succeeded) {
        state
            .broadcaster
            .broadcast(&MutationEvent::new(action, payload))
            .await;
    }

    Json(response)
}

async fn subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_subscriber(socket, state))
}

async fn run_subscriber(socket: WebSocket, state: AppState) {
    let registry = Arc::clone(state.broadcaster.registry());
    // The registry keeps the only sender, so unregistering closes the inbox.
    let (subscriber, inbox) = registry.accept(state.config.subscriber_buffer).await;
    let id = subscriber.id();
    drop(subscriber);
    let subscribers = registry.len().await;
    info!(subscriber = %id, subscribers, "subscriber connected");

    pump_frames(socket, inbox, id, &state.config).await;

    if registry.unregister(id).await {
        let subscribers = registry.len().await;
        info!(subscriber = %id, subscribers, "subscriber disconnected");
    }
}

/// Writes queued frames to the socket while draining whatever the client
/// sends, until either side goes away.
async fn pump_frames(socket: WebSocket, mut inbox: Inbox, id: SubscriberId, config: &FeedConfig) {
    let (mut sink, mut stream) = socket.split();

    loop {
        select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(subscriber = %id, error = ?err, "subscriber read failed");
                    break;
                }
            },
            frame = inbox.recv() => {
                let Some(frame) = frame else {
                    debug!(subscriber = %id, "subscriber removed by broadcaster");
                    break;
                };
                let write = sink.send(Message::Text(frame.to_string()));
                match tokio::time::timeout(config.delivery_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        debug!(subscriber = %id, error = ?err, "subscriber write failed");
                        break;
                    }
                    Err(_) => {
                        debug!(subscriber = %id, "subscriber write timed out");
                        break;
                    }
                }
            }
        }
    }

    if let Err(err) = sink.close().await {
        debug!(subscriber = %id, error = ?err, "failed to close subscriber socket");
    }
}
