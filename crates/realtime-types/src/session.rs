use crate::audio::{InputAudioTranscription, TranscriptionModel, TurnDetection, Voice};
use crate::tools::{Tool, ToolChoice};

/// Session configuration carried by `session.update`.
///
/// Every field is optional on the wire; unset fields are left out so the
/// model keeps its current value for them.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// The set of modalities the model can respond with, e.g. ["text", "audio"].
    #[serde(skip_serializing_if = "Option::is_none")]
    modalities: Option<Vec<String>>,

    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    turn_detection: Option<TurnDetection>,

    /// Tools (functions) available to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.session.modalities = Some(vec!["text".to_string(), "audio".to_string()]);
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.session.voice = Some(voice);
        self
    }

    pub fn with_input_audio_transcription_enable(mut self, model: TranscriptionModel) -> Self {
        self.session.input_audio_transcription = Some(InputAudioTranscription::new(model));
        self
    }

    pub fn with_turn_detection_enable(mut self, turn_detection: TurnDetection) -> Self {
        self.session.turn_detection = Some(turn_detection);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.session.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.session.tool_choice = Some(tool_choice);
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_only_session_serializes_minimal_object() {
        let session = Session::builder().with_instructions("be brief").build();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json, serde_json::json!({ "instructions": "be brief" }));
    }
}
