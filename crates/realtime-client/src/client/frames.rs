use crate::types::{ClientEvent, ServerEvent};

/// One inbound message: the typed event plus the JSON text it came from.
///
/// Events outside the modelled subset parse as [`ServerEvent::Unknown`] but
/// keep their full payload in `raw`, so they can be passed on untouched.
#[derive(Debug, Clone)]
pub struct ServerFrame {
    event: ServerEvent,
    raw: String,
}

impl ServerFrame {
    /// Parses a text frame. Text that is not a valid server event is kept
    /// as `Unknown` with a warning rather than dropped.
    pub fn from_text(text: &str) -> Self {
        let event = match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("failed to deserialize event: {}, text=> {:?}", e, text);
                ServerEvent::Unknown
            }
        };
        Self {
            event,
            raw: text.to_string(),
        }
    }

    /// A frame for an event produced locally, such as the closing `close`.
    pub fn synthetic(event: ServerEvent) -> Self {
        let raw = serde_json::to_string(&event).unwrap_or_else(|e| {
            tracing::error!("failed to serialize {} event: {}", event.kind(), e);
            String::new()
        });
        Self { event, raw }
    }

    pub fn event(&self) -> &ServerEvent {
        &self.event
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn into_event(self) -> ServerEvent {
        self.event
    }
}

/// One outbound message. Typed events go through the wire translation;
/// raw frames are written as given.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Event(ClientEvent),
    Raw(String),
}

impl From<ClientEvent> for ClientFrame {
    fn from(event: ClientEvent) -> Self {
        ClientFrame::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmodelled_event_keeps_its_payload() {
        let text = r#"{"type":"response.audio_transcript.delta","event_id":"e1","delta":"Hello"}"#;
        let frame = ServerFrame::from_text(text);

        assert!(matches!(frame.event(), ServerEvent::Unknown));
        let payload: serde_json::Value = serde_json::from_str(frame.raw()).unwrap();
        assert_eq!(payload["delta"], "Hello");
    }

    #[test]
    fn malformed_modelled_event_is_kept_raw() {
        let text = r#"{"type":"response.done","response":"not an object"}"#;
        let frame = ServerFrame::from_text(text);

        assert!(matches!(frame.event(), ServerEvent::Unknown));
        assert_eq!(frame.raw(), text);
    }

    #[test]
    fn synthetic_close_serializes_its_type() {
        let frame = ServerFrame::synthetic(ServerEvent::Close {
            reason: Some("socket closed".to_string()),
        });
        assert!(frame.raw().contains(r#""type":"close""#));
        assert!(matches!(frame.into_event(), ServerEvent::Close { .. }));
    }
}
