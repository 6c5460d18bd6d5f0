use crate::audio::Base64EncodedAudioBytes;
use crate::items::{FunctionCallItem, Item};
use crate::session::Session;

/// `session.update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// The session configuration to update
    session: Session,
}

impl SessionUpdateEvent {
    pub fn new(session: Session) -> Self {
        Self {
            event_id: None,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// `input_audio_buffer.append` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferAppendEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// The audio data to append to the buffer
    audio: Base64EncodedAudioBytes,
}

impl InputAudioBufferAppendEvent {
    pub fn new(audio: Base64EncodedAudioBytes) -> Self {
        Self {
            event_id: None,
            audio,
        }
    }

    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.audio
    }
}

/// Payload-less client events (`input_audio_buffer.commit`, `response.create`, ...).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EmptyClientEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
}

impl EmptyClientEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `conversation.item.create` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationItemCreateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// The item to add to the conversation
    item: Item,
}

impl ConversationItemCreateEvent {
    pub fn new(item: Item) -> Self {
        Self {
            event_id: None,
            item,
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }
}

/// `function.response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionResponseEvent {
    response: FunctionResponse,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionResponse {
    /// The call this result answers, as the model sent it.
    function_call: FunctionCallItem,
    /// `{success, message, ...}` produced by the executor.
    output: serde_json::Value,
}

impl FunctionResponseEvent {
    pub fn new(function_call: FunctionCallItem, output: serde_json::Value) -> Self {
        Self {
            response: FunctionResponse {
                function_call,
                output,
            },
        }
    }

    pub fn function_call(&self) -> &FunctionCallItem {
        &self.response.function_call
    }

    pub fn output(&self) -> &serde_json::Value {
        &self.response.output
    }
}
