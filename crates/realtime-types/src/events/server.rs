use crate::items::{FunctionCallItem, OutputItem};

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: String,

    /// Details about the error
    error: ErrorDetails,
}

impl ErrorEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn error(&self) -> &ErrorDetails {
        &self.error
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    code: Option<String>,
    message: String,
}

impl ErrorDetails {
    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `session.created` / `session.updated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionEvent {
    #[serde(default)]
    event_id: String,

    /// The session resource as reported by the model; kept opaque.
    #[serde(default)]
    session: serde_json::Value,
}

impl SessionEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn session(&self) -> &serde_json::Value {
        &self.session
    }
}

/// `input_audio_buffer.speech_started` / `speech_stopped` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpeechEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    item_id: String,
}

impl SpeechEvent {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

/// `conversation.item.input_audio_transcription.completed` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionCompletedEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    item_id: String,
    /// The transcribed text
    transcript: String,
}

impl TranscriptionCompletedEvent {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

/// `response.created` / `response.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseEvent {
    #[serde(default)]
    event_id: String,

    /// The response resource
    response: ResponseResource,
}

impl ResponseEvent {
    pub fn new(response: ResponseResource) -> Self {
        Self {
            event_id: String::new(),
            response,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn response(&self) -> &ResponseResource {
        &self.response
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResponseResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ResponseResource {
    pub fn with_output(output: Vec<OutputItem>) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn output(&self) -> &[OutputItem] {
        &self.output
    }

    /// Function-call outputs in the order the model emitted them.
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCallItem> {
        self.output.iter().filter_map(|item| match item {
            OutputItem::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    #[serde(default)]
    total_tokens: i32,
    #[serde(default)]
    input_tokens: i32,
    #[serde(default)]
    output_tokens: i32,
}

impl Usage {
    pub fn total_tokens(&self) -> i32 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> i32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> i32 {
        self.output_tokens
    }
}

/// `response.audio.delta` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioDeltaEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    item_id: String,
    /// Base64-encoded audio chunk
    delta: String,
}

impl ResponseAudioDeltaEvent {
    pub fn delta(&self) -> &str {
        &self.delta
    }
}

/// `response.audio_transcript.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioTranscriptDoneEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    item_id: String,
    transcript: String,
}

impl ResponseAudioTranscriptDoneEvent {
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}
