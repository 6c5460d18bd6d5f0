use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::client::frames::{ClientFrame, ServerFrame};
use crate::client::stats::Stats;
use crate::types;

pub(crate) mod config;
pub(crate) mod frames;
pub(crate) mod stats;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientFrame>;
type ServerTx = tokio::sync::broadcast::Sender<ServerFrame>;
pub type ServerRx = tokio::sync::broadcast::Receiver<ServerFrame>;

/// A WebSocket connection to the realtime model.
///
/// Outbound events are queued on an mpsc channel and written by a send task;
/// inbound events are parsed by a receive task and broadcast to every
/// subscriber. Dropping the client aborts both tasks.
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    stats: Arc<Mutex<Stats>>,
    handles: Vec<JoinHandle<()>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
            handles: Vec::new(),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        if !self.config.has_api_key() {
            tracing::warn!("connecting to {} without an API key", self.config.base_url());
        }
        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!("connected to realtime model {}", self.config.model());

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientFrame>(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());

        let send_handle = tokio::spawn(async move {
            while let Some(frame) = c_rx.recv().await {
                for text in utils::to_wire_texts(frame) {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("failed to send message: {}", e);
                    }
                }
            }
            tracing::debug!("outbound channel closed, send task exiting");
        });

        let stats = self.stats.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => {
                        let frame = ServerFrame::from_text(&text);
                        tracing::debug!("received event: {}", frame.event().kind());
                        if let types::ServerEvent::ResponseDone(done) = frame.event() {
                            if let Some(usage) = done.response().usage() {
                                match stats.lock() {
                                    Ok(mut guard) => guard.update_usage(
                                        usage.total_tokens(),
                                        usage.input_tokens(),
                                        usage.output_tokens(),
                                    ),
                                    Err(_) => tracing::error!("failed to update stats"),
                                }
                            }
                        }
                        // No subscribers is not an error worth more than a trace.
                        if s_tx.send(frame).is_err() {
                            tracing::trace!("no subscribers for server event");
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message of {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            let close_event = ServerFrame::synthetic(types::ServerEvent::Close {
                reason: Some("socket closed".to_string()),
            });
            if let Err(e) = s_tx.send(close_event) {
                tracing::debug!("failed to send close event: {}", e);
            }
        });

        self.handles = vec![send_handle, recv_handle];
        Ok(())
    }

    /// A fresh subscription to server events.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// A sender other tasks can use to queue client events.
    pub fn sender(&self) -> Result<ClientTx> {
        match self.c_tx {
            Some(ref tx) => Ok(tx.clone()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    pub fn stats(&self) -> Result<Stats> {
        match self.stats.lock() {
            Ok(guard) => Ok(guard.clone()),
            Err(_) => Err(anyhow::anyhow!("failed to get stats")),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub async fn connect_with_config(capacity: usize, config: config::Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}
