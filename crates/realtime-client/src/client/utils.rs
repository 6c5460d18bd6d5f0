use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::client::config::Config;
use crate::client::frames::ClientFrame;
use crate::types::events::client::{ConversationItemCreateEvent, EmptyClientEvent};
use crate::types::{ClientEvent, FunctionCallOutputItem, Item};

const AUTHORIZATION_HEADER: &str = "Authorization";
const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = config.endpoint().into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Bearer {}", config.api_key().expose_secret())
            .as_str()
            .parse()?,
    );
    request
        .headers_mut()
        .insert(OPENAI_BETA_HEADER, "realtime=v1".parse()?);
    Ok(request)
}

/// Rewrites a client event into what the model actually accepts.
///
/// `function.response` becomes a `function_call_output` item followed by
/// `response.create`, so the model speaks about the result. A result whose
/// call carries no `call_id` cannot be matched by the model and is dropped.
/// Every other event passes through unchanged.
pub fn to_wire_events(event: ClientEvent) -> Vec<ClientEvent> {
    match event {
        ClientEvent::FunctionResponse(response) => {
            let Some(call_id) = response.function_call().call_id() else {
                tracing::warn!(
                    "dropping result of {}: call has no call_id",
                    response.function_call().name()
                );
                return vec![];
            };
            let output = response.output().to_string();
            vec![
                ClientEvent::ConversationItemCreate(ConversationItemCreateEvent::new(
                    Item::FunctionCallOutput(FunctionCallOutputItem::new(call_id, &output)),
                )),
                ClientEvent::ResponseCreate(EmptyClientEvent::new()),
            ]
        }
        other => vec![other],
    }
}

/// The text frames to write for one outbound frame.
pub fn to_wire_texts(frame: ClientFrame) -> Vec<String> {
    match frame {
        ClientFrame::Raw(text) => vec![text],
        ClientFrame::Event(event) => to_wire_events(event)
            .iter()
            .filter_map(|event| match serde_json::to_string(event) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::error!("failed to serialize event: {}", e);
                    None
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::client::FunctionResponseEvent;
    use crate::types::FunctionCallItem;

    #[test]
    fn function_response_becomes_output_item_and_response_create() {
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_1");
        let event = ClientEvent::FunctionResponse(FunctionResponseEvent::new(
            call,
            serde_json::json!({"success": false, "message": "No active patent session found"}),
        ));

        let wire = to_wire_events(event);

        assert_eq!(wire.len(), 2);
        match &wire[0] {
            ClientEvent::ConversationItemCreate(create) => match create.item() {
                Item::FunctionCallOutput(output) => {
                    assert_eq!(output.call_id(), "call_1");
                    let parsed: serde_json::Value = serde_json::from_str(output.output()).unwrap();
                    assert_eq!(parsed["success"], false);
                }
                other => panic!("unexpected item: {:?}", other),
            },
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(wire[1], ClientEvent::ResponseCreate(_)));
    }

    #[test]
    fn function_response_without_call_id_is_dropped() {
        let call = FunctionCallItem::new("display_patent", "{}");
        let event = ClientEvent::FunctionResponse(FunctionResponseEvent::new(
            call,
            serde_json::json!({"success": true, "message": "ok"}),
        ));
        assert!(to_wire_events(event).is_empty());
    }

    #[test]
    fn raw_frames_are_written_verbatim() {
        let text = r#"{"type":"conversation.item.truncate","item_id":"i1","content_index":0,"audio_end_ms":1500}"#;
        assert_eq!(to_wire_texts(ClientFrame::Raw(text.to_string())), vec![text.to_string()]);
    }

    #[test]
    fn typed_function_response_becomes_two_text_frames() {
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_2");
        let frame = ClientFrame::from(ClientEvent::FunctionResponse(FunctionResponseEvent::new(
            call,
            serde_json::json!({"success": true, "message": "ok"}),
        )));

        let texts = to_wire_texts(frame);

        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains(r#""type":"conversation.item.create""#));
        assert!(texts[1].contains(r#""type":"response.create""#));
    }

    #[test]
    fn other_events_pass_through() {
        let wire = to_wire_events(ClientEvent::InputAudioBufferCommit(EmptyClientEvent::new()));
        assert_eq!(wire.len(), 1);
        assert!(matches!(wire[0], ClientEvent::InputAudioBufferCommit(_)));
    }

    #[test]
    fn request_targets_model_and_carries_auth() {
        let config = Config::new("sk-test")
            .with_base_url("wss://example.test/v1")
            .with_model("test-model");
        let request = build_request(&config).unwrap();
        assert_eq!(
            request.uri().to_string(),
            "wss://example.test/v1/realtime?model=test-model"
        );
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Bearer sk-test");
        assert_eq!(request.headers()[OPENAI_BETA_HEADER], "realtime=v1");
    }
}
