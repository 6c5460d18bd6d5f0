pub mod client;
pub mod server;

use client::*;
use server::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend(InputAudioBufferAppendEvent),
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit(EmptyClientEvent),
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear(EmptyClientEvent),
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate(ConversationItemCreateEvent),
    #[serde(rename = "response.create")]
    ResponseCreate(EmptyClientEvent),
    #[serde(rename = "response.cancel")]
    ResponseCancel(EmptyClientEvent),
    /// Result of a locally executed function call. The transport rewrites
    /// this into the model's native item/response pair.
    #[serde(rename = "function.response")]
    FunctionResponse(FunctionResponseEvent),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Synthesised by the transport when the socket closes.
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(SpeechEvent),
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped(SpeechEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(TranscriptionCompletedEvent),
    #[serde(rename = "response.created")]
    ResponseCreated(ResponseEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseEvent),
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta(ResponseAudioDeltaEvent),
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone(ResponseAudioTranscriptDoneEvent),
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// The `type` tag, mostly for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Close { .. } => "close",
            ServerEvent::Error(_) => "error",
            ServerEvent::SessionCreated(_) => "session.created",
            ServerEvent::SessionUpdated(_) => "session.updated",
            ServerEvent::InputAudioBufferSpeechStarted(_) => "input_audio_buffer.speech_started",
            ServerEvent::InputAudioBufferSpeechStopped(_) => "input_audio_buffer.speech_stopped",
            ServerEvent::ConversationItemInputAudioTranscriptionCompleted(_) => {
                "conversation.item.input_audio_transcription.completed"
            }
            ServerEvent::ResponseCreated(_) => "response.created",
            ServerEvent::ResponseDone(_) => "response.done",
            ServerEvent::ResponseAudioDelta(_) => "response.audio.delta",
            ServerEvent::ResponseAudioTranscriptDone(_) => "response.audio_transcript.done",
            ServerEvent::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{FunctionCallItem, OutputItem};

    #[test]
    fn response_done_exposes_function_calls() {
        let raw = r#"{
            "type": "response.done",
            "event_id": "evt_1",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [
                    {"type": "function_call", "name": "create_template", "arguments": "{\"title\":\"Widget\"}", "call_id": "call_1"}
                ],
                "usage": {"total_tokens": 30, "input_tokens": 20, "output_tokens": 10}
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        let ServerEvent::ResponseDone(done) = event else {
            panic!("expected response.done");
        };
        let calls: Vec<&FunctionCallItem> = done.response().function_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "create_template");
        assert!(matches!(done.response().output()[0], OutputItem::FunctionCall(_)));
        assert_eq!(done.response().usage().map(|u| u.total_tokens()), Some(30));
    }

    #[test]
    fn unmodelled_server_events_are_unknown() {
        let raw = r#"{"type": "rate_limits.updated", "event_id": "evt_2", "rate_limits": []}"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn function_response_wire_shape() {
        let call = FunctionCallItem::new("display_patent", "{}").with_call_id("call_9");
        let event = ClientEvent::FunctionResponse(FunctionResponseEvent::new(
            call,
            serde_json::json!({"success": true, "message": "ok"}),
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "function.response");
        assert_eq!(json["response"]["function_call"]["call_id"], "call_9");
        assert_eq!(json["response"]["output"]["success"], true);
    }
}
