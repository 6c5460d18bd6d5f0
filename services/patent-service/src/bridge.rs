//! Browser-facing WebSocket bridge.
//!
//! Each browser connection gets its own realtime model connection and its own
//! [`EventRelay`]. The patent session and duplicate ledger behind the shared
//! executor are process-wide.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, Stream, StreamExt};
use patent_core::bootstrap::SessionBootstrap;
use patent_core::executor::FunctionExecutor;
use patent_core::relay::EventRelay;
use realtime_client::types::{ClientEvent, ServerEvent};
use realtime_client::{ClientFrame, ServerFrame, ServerRx};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::config::Config;

const MODEL_CHANNEL_CAPACITY: usize = 1024;
const BROWSER_CHANNEL_CAPACITY: usize = 256;
const RELAY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct RealtimeSettings {
    api_key: String,
    model: String,
    base_url: String,
}

/// Shared state handed to every connection.
#[derive(Clone)]
pub struct AppState {
    executor: Arc<FunctionExecutor>,
    bootstrap: SessionBootstrap,
    realtime: Arc<RealtimeSettings>,
}

impl AppState {
    pub fn new(executor: Arc<FunctionExecutor>, bootstrap: SessionBootstrap, config: &Config) -> Self {
        Self {
            executor,
            bootstrap,
            realtime: Arc::new(RealtimeSettings {
                api_key: config.openai_api_key().to_string(),
                model: config.realtime_model().to_string(),
                base_url: config.realtime_base_url().to_string(),
            }),
        }
    }

    fn client_config(&self) -> realtime_client::Config {
        realtime_client::Config::new(&self.realtime.api_key)
            .with_model(&self.realtime.model)
            .with_base_url(&self.realtime.base_url)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    tracing::info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_socket(socket, state).await {
            tracing::error!("connection ended with error: {:#}", e);
        }
    })
}

async fn handle_socket(socket: WebSocket, state: AppState) -> Result<()> {
    tracing::info!("WebSocket connection established");

    let client = realtime_client::connect_with_config(MODEL_CHANNEL_CAPACITY, state.client_config())
        .await
        .context("Failed to connect to the realtime model")?;
    let model_tx = client.sender()?;
    let server_rx = client.server_events()?;

    let (mut browser_sink, mut browser_stream) = socket.split();
    let (browser_tx, mut browser_rx) = mpsc::channel::<String>(BROWSER_CHANNEL_CAPACITY);
    let (relay_tx, mut relay_rx) = mpsc::channel::<ClientEvent>(RELAY_CHANNEL_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(text) = browser_rx.recv().await {
            if browser_sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Relay output goes to the model. Function results are echoed to the
    // browser so the UI can show the draft as it grows.
    let result_tx = browser_tx.clone();
    let relay_model_tx = model_tx.clone();
    let outbound = tokio::spawn(async move {
        while let Some(event) = relay_rx.recv().await {
            if matches!(event, ClientEvent::FunctionResponse(_)) {
                match serde_json::to_string(&event) {
                    Ok(text) => forward(&result_tx, text).await,
                    Err(e) => tracing::warn!("failed to serialize function result for browser: {}", e),
                }
            }
            if relay_model_tx.send(ClientFrame::Event(event)).await.is_err() {
                tracing::debug!("model channel closed, stopping relay output");
                break;
            }
        }
    });

    let relay = EventRelay::new(state.executor.clone(), state.bootstrap.clone(), relay_tx);
    let inbound = tokio::spawn(relay.run(mirrored_server_events(server_rx, browser_tx)));

    while let Some(message) = browser_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let Some(frame) = route_browser_text(text.as_str()) else {
                    continue;
                };
                if model_tx.send(frame).await.is_err() {
                    tracing::warn!("model connection closed");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::info!("WebSocket error: {}", e);
                break;
            }
        }
    }

    if let Ok(stats) = client.stats() {
        tracing::info!(
            "model usage: {} responses, {} tokens ({} in, {} out)",
            stats.responses(),
            stats.total_tokens(),
            stats.input_tokens(),
            stats.output_tokens()
        );
    }
    drop(model_tx);
    drop(client);
    if let Err(e) = inbound.await {
        tracing::warn!("relay task failed: {}", e);
    }
    outbound.abort();
    writer.abort();

    tracing::info!("WebSocket connection closed");
    Ok(())
}

/// Decides what a browser text frame becomes on the model connection.
///
/// Typed events are sent as events. Anything else that is a JSON object
/// with a `type` goes through verbatim. `session.update` is dropped in
/// both forms because the relay owns the session configuration.
fn route_browser_text(text: &str) -> Option<ClientFrame> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::SessionUpdate(_)) => {
            tracing::warn!("ignoring session.update from browser, configuration is server-owned");
            None
        }
        Ok(event) => Some(ClientFrame::Event(event)),
        Err(_) => {
            let value = match serde_json::from_str::<serde_json::Value>(text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("unparseable browser frame: {}", e);
                    return None;
                }
            };
            match value.get("type").and_then(serde_json::Value::as_str) {
                Some("session.update") => {
                    tracing::warn!("ignoring session.update from browser, configuration is server-owned");
                    None
                }
                Some(_) => Some(ClientFrame::Raw(text.to_string())),
                None => {
                    tracing::warn!("browser frame without a type, dropping");
                    None
                }
            }
        }
    }
}

/// Queues `text` for the browser, waiting for room in the queue.
async fn forward(browser_tx: &mpsc::Sender<String>, text: String) {
    if browser_tx.send(text).await.is_err() {
        tracing::debug!("browser writer gone, dropping event");
    }
}

/// Server events for the relay. Every frame's original text is sent to the
/// browser first, unmodelled events included.
fn mirrored_server_events(
    rx: ServerRx,
    browser_tx: mpsc::Sender<String>,
) -> impl Stream<Item = ServerEvent> {
    server_frame_stream(rx).then(move |frame| {
        let browser_tx = browser_tx.clone();
        async move {
            if !frame.raw().is_empty() {
                forward(&browser_tx, frame.raw().to_string()).await;
            }
            frame.into_event()
        }
    })
}

/// Adapts the client's broadcast receiver into a stream that ends when the
/// connection closes. Lagged receivers skip ahead with a warning.
fn server_frame_stream(rx: ServerRx) -> impl Stream<Item = ServerFrame> {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => return Some((frame, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("relay lagged behind, skipped {} server events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
