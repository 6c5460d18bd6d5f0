use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt};
use realtime_types::events::client::FunctionResponseEvent;
use realtime_types::{ClientEvent, FunctionCallItem, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::PatentError;
use crate::bootstrap::SessionBootstrap;
use crate::executor::{FunctionExecutor, FunctionOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Inactive,
    Configuring,
    Active,
}

/// Sits between the model's event stream and the function executor.
///
/// Inbound events are handled strictly in arrival order. Function calls are
/// executed on spawned tasks and their results are sent on `outbound` in the
/// order the executions finish.
pub struct EventRelay {
    executor: Arc<FunctionExecutor>,
    bootstrap: SessionBootstrap,
    outbound: mpsc::Sender<ClientEvent>,
    state: RelayState,
    configured: bool,
    // Serialized form of the last function call delivered. Only the
    // immediately preceding call is compared.
    last_signature: Option<String>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl EventRelay {
    pub fn new(
        executor: Arc<FunctionExecutor>,
        bootstrap: SessionBootstrap,
        outbound: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            executor,
            bootstrap,
            outbound,
            state: RelayState::Inactive,
            configured: false,
            last_signature: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Handles a readiness signal. Sends the configuration the first time
    /// per activation and returns whether it did.
    pub async fn activate(&mut self) -> bool {
        if self.configured {
            tracing::debug!("channel already configured, ignoring readiness signal");
            return false;
        }

        self.state = RelayState::Configuring;
        match self.outbound.send(self.bootstrap.configuration_event()).await {
            Ok(()) => {
                self.configured = true;
                self.state = RelayState::Active;
                tracing::info!("session configuration sent, relay active");
                true
            }
            Err(e) => {
                tracing::warn!("failed to send session configuration: {}", e);
                self.state = RelayState::Inactive;
                false
            }
        }
    }

    /// Resets per-activation state. The active patent session is kept so a
    /// later activation can resume it.
    pub fn deactivate(&mut self) {
        if self.state != RelayState::Inactive {
            tracing::info!("relay deactivated");
        }
        self.state = RelayState::Inactive;
        self.configured = false;
        self.last_signature = None;
    }

    /// Processes one inbound event and returns the executions it started.
    pub async fn handle_event(&mut self, event: &ServerEvent) -> Vec<JoinHandle<()>> {
        match event {
            ServerEvent::SessionCreated(_) => {
                self.activate().await;
                Vec::new()
            }
            ServerEvent::Close { reason } => {
                tracing::info!("channel closed: {:?}", reason);
                self.deactivate();
                Vec::new()
            }
            ServerEvent::Error(e) => {
                tracing::warn!("model reported {}: {}", e.error().error_type(), e.error().message());
                Vec::new()
            }
            ServerEvent::ResponseDone(done) => {
                let mut handles = Vec::new();
                for call in done.response().function_calls() {
                    let signature = match serde_json::to_string(call) {
                        Ok(signature) => signature,
                        Err(e) => {
                            tracing::error!("failed to serialize function call: {}", e);
                            continue;
                        }
                    };
                    if self.last_signature.as_deref() == Some(signature.as_str()) {
                        tracing::debug!("dropping repeated delivery of {}", call.name());
                        continue;
                    }
                    self.last_signature = Some(signature);
                    handles.extend(self.deliver(call.clone()));
                }
                handles
            }
            _ => Vec::new(),
        }
    }

    /// Starts executing `call` unless the same call is already running.
    pub fn deliver(&self, call: FunctionCallItem) -> Option<JoinHandle<()>> {
        let marker = match call.call_id() {
            Some(call_id) => call_id.to_string(),
            None => serde_json::to_string(&call).ok()?,
        };
        if !lock(&self.in_flight).insert(marker.clone()) {
            tracing::debug!("{} ({}) already in flight", call.name(), marker);
            return None;
        }

        let executor = self.executor.clone();
        let outbound = self.outbound.clone();
        let in_flight = self.in_flight.clone();
        Some(tokio::spawn(async move {
            tracing::info!("executing {} ({})", call.name(), marker);
            let output = match executor.execute(call.name(), call.arguments()).await {
                Ok(output) => output,
                Err(e @ PatentError::UnknownOperation(_)) => {
                    tracing::warn!("rejected call: {}", e);
                    FunctionOutput::failure(e.to_string()).with("error", "unknown_function")
                }
                Err(e) => FunctionOutput::from(e),
            };
            tracing::info!(
                "{} finished: success={}, message={:?}",
                call.name(),
                output.success(),
                output.message()
            );
            lock(&in_flight).remove(&marker);

            let event = ClientEvent::FunctionResponse(FunctionResponseEvent::new(call, output.into_value()));
            if outbound.send(event).await.is_err() {
                tracing::debug!("channel gone, dropping function result");
            }
        }))
    }

    /// Consumes inbound events until the stream ends, then deactivates.
    /// Executions still running at that point finish on their own.
    pub async fn run<S>(mut self, events: S)
    where
        S: Stream<Item = ServerEvent>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.handle_event(&event).await;
        }
        self.deactivate();
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentHandle, DocumentStore, FsDocumentStore};
    use crate::ledger::DuplicateLedger;
    use crate::registry::SessionRegistry;
    use realtime_types::OutputItem;
    use realtime_types::events::server::{ResponseEvent, ResponseResource};
    use serde_json::json;
    use std::time::Duration;
    use async_trait::async_trait;
    use tempfile::{TempDir, tempdir};

    struct Harness {
        _dir: TempDir,
        registry: Arc<SessionRegistry>,
        relay: EventRelay,
        rx: mpsc::Receiver<ClientEvent>,
    }

    fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let store = Arc::new(FsDocumentStore::new(dir.path()));
        harness_with(dir, store)
    }

    fn harness_with(dir: TempDir, store: Arc<dyn DocumentStore>) -> Harness {
        let registry = Arc::new(SessionRegistry::new(store));
        let executor = Arc::new(FunctionExecutor::new(
            registry.clone(),
            Arc::new(DuplicateLedger::default()),
        ));
        let (tx, rx) = mpsc::channel(32);
        let relay = EventRelay::new(executor, SessionBootstrap::default(), tx);
        Harness {
            _dir: dir,
            registry,
            relay,
            rx,
        }
    }

    fn session_created() -> ServerEvent {
        serde_json::from_value(json!({"type": "session.created", "event_id": "e0", "session": {}})).unwrap()
    }

    fn response_done(calls: &[FunctionCallItem]) -> ServerEvent {
        let output = calls.iter().cloned().map(OutputItem::FunctionCall).collect();
        ServerEvent::ResponseDone(ResponseEvent::new(ResponseResource::with_output(output)))
    }

    fn drain(rx: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn function_responses(events: &[ClientEvent]) -> Vec<&FunctionResponseEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::FunctionResponse(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    async fn join(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn configuration_is_sent_once_per_activation() {
        let mut h = harness();

        for _ in 0..3 {
            h.relay.handle_event(&session_created()).await;
        }
        let first = drain(&mut h.rx);
        assert_eq!(first.len(), 1);
        assert!(matches!(first[0], ClientEvent::SessionUpdate(_)));
        assert_eq!(h.relay.state(), RelayState::Active);

        h.relay
            .handle_event(&ServerEvent::Close { reason: None })
            .await;
        assert_eq!(h.relay.state(), RelayState::Inactive);
        assert!(!h.relay.is_configured());

        h.relay.handle_event(&session_created()).await;
        h.relay.handle_event(&session_created()).await;
        let second = drain(&mut h.rx);
        assert_eq!(second.len(), 1);
        assert!(matches!(second[0], ClientEvent::SessionUpdate(_)));
    }

    #[tokio::test]
    async fn failed_configuration_send_stays_unconfigured() {
        let mut h = harness();
        drop(h.rx);

        assert!(!h.relay.activate().await);
        assert_eq!(h.relay.state(), RelayState::Inactive);
        assert!(!h.relay.is_configured());
    }

    #[tokio::test]
    async fn repeated_delivery_executes_once() {
        let mut h = harness();
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_1");

        let mut handles = h.relay.handle_event(&response_done(&[call.clone()])).await;
        handles.extend(h.relay.handle_event(&response_done(&[call.clone()])).await);
        assert_eq!(handles.len(), 1);
        join(handles).await;

        let events = drain(&mut h.rx);
        let responses = function_responses(&events);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].function_call(), &call);
        assert_eq!(
            responses[0].output(),
            &json!({"success": false, "message": "No active patent session found"})
        );
    }

    /// Filesystem store whose reads take `delay`.
    struct SlowReads {
        inner: FsDocumentStore,
        delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowReads {
        async fn create(&self, session_id: &str, title: &str) -> Result<DocumentHandle, PatentError> {
            self.inner.create(session_id, title).await
        }

        async fn read(&self, session_id: &str) -> Result<String, PatentError> {
            tokio::time::sleep(self.delay).await;
            self.inner.read(session_id).await
        }

        async fn append(&self, session_id: &str, text: &str) -> Result<(), PatentError> {
            self.inner.append(session_id, text).await
        }

        async fn overwrite(&self, session_id: &str, text: &str) -> Result<(), PatentError> {
            self.inner.overwrite(session_id, text).await
        }
    }

    #[tokio::test]
    async fn identical_calls_in_one_response_execute_once() {
        let mut h = harness();
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_1");

        let handles = h
            .relay
            .handle_event(&response_done(&[call.clone(), call.clone()]))
            .await;
        assert_eq!(handles.len(), 1);
        join(handles).await;

        assert_eq!(function_responses(&drain(&mut h.rx)).len(), 1);
    }

    #[tokio::test]
    async fn results_are_sent_in_completion_order() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SlowReads {
            inner: FsDocumentStore::new(dir.path()),
            delay: Duration::from_millis(100),
        });
        let mut h = harness_with(dir, store);
        h.registry.start_new("Widget").await.unwrap();

        let display = FunctionCallItem::new("display_patent", "{}").with_call_id("slow");
        let export = FunctionCallItem::new("export_as_pdf", "{}").with_call_id("fast");
        join(h.relay.handle_event(&response_done(&[display, export])).await).await;

        let events = drain(&mut h.rx);
        let order: Vec<Option<&str>> = function_responses(&events)
            .iter()
            .map(|r| r.function_call().call_id())
            .collect();
        assert_eq!(order, vec![Some("fast"), Some("slow")]);
    }

    #[tokio::test]
    async fn only_the_previous_call_is_compared() {
        let mut h = harness();
        let display = FunctionCallItem::new("display_patent", "{}").with_call_id("call_a");
        let export = FunctionCallItem::new("export_as_pdf", "{}").with_call_id("call_b");

        for call in [&display, &export, &display] {
            let handles = h.relay.handle_event(&response_done(&[call.clone()])).await;
            assert_eq!(handles.len(), 1);
            join(handles).await;
        }

        assert_eq!(function_responses(&drain(&mut h.rx)).len(), 3);
    }

    #[tokio::test]
    async fn in_flight_call_is_not_redelivered() {
        let h = harness();
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_1");

        let first = h.relay.deliver(call.clone());
        let second = h.relay.deliver(call.clone());
        assert!(first.is_some());
        assert!(second.is_none());

        join(first.into_iter().collect()).await;
        let again = h.relay.deliver(call);
        assert!(again.is_some());
        join(again.into_iter().collect()).await;
    }

    #[tokio::test]
    async fn results_carry_the_original_call() {
        let mut h = harness();
        let call = FunctionCallItem::new("create_template", r#"{"title":"Widget"}"#)
            .with_call_id("call_7")
            .with_id("item_7");

        join(h.relay.handle_event(&response_done(&[call.clone()])).await).await;

        let events = drain(&mut h.rx);
        let responses = function_responses(&events);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].function_call().call_id(), Some("call_7"));
        assert_eq!(responses[0].output()["success"], true);
        assert_eq!(h.registry.current().unwrap().title(), "Widget");
    }

    #[tokio::test]
    async fn unknown_function_gets_an_explicit_rejection() {
        let mut h = harness();
        let call = FunctionCallItem::new("format_disk", "{}").with_call_id("call_x");

        join(h.relay.handle_event(&response_done(&[call])).await).await;

        let events = drain(&mut h.rx);
        let output = function_responses(&events)[0].output().clone();
        assert_eq!(output["success"], false);
        assert_eq!(output["error"], "unknown_function");
        assert_eq!(output["message"], "Unknown function: format_disk");
    }

    #[tokio::test]
    async fn deactivation_keeps_the_patent_session() {
        let mut h = harness();
        h.relay.activate().await;
        let create = FunctionCallItem::new("create_template", r#"{"title":"Lamp"}"#).with_call_id("c1");
        join(h.relay.handle_event(&response_done(&[create.clone()])).await).await;

        h.relay.deactivate();
        assert!(h.registry.current().is_some());

        // The signature marker was reset, so the same call is delivered again.
        let handles = h.relay.handle_event(&response_done(&[create])).await;
        assert_eq!(handles.len(), 1);
    }

    #[tokio::test]
    async fn run_consumes_the_stream_in_order() {
        let h = harness();
        let mut rx = h.rx;
        let create = FunctionCallItem::new("create_template", r#"{"title":"Kite"}"#).with_call_id("c1");
        let events = vec![
            session_created(),
            response_done(&[create]),
            serde_json::from_value(json!({"type": "rate_limits.updated", "rate_limits": []})).unwrap(),
        ];

        h.relay.run(futures::stream::iter(events)).await;

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
        }
        assert!(matches!(received[0], ClientEvent::SessionUpdate(_)));
        assert_eq!(function_responses(&received).len(), 1);
        assert_eq!(h.registry.current().unwrap().title(), "Kite");
    }
}
