use realtime_types::audio::{TranscriptionModel, TurnDetection, Voice};
use realtime_types::events::client::SessionUpdateEvent;
use realtime_types::{ClientEvent, FunctionTool, Session, Tool, ToolChoice};

use crate::executor::Operation;

pub const DEFAULT_INSTRUCTIONS: &str = r#"You are a patent drafting assistant talking with an inventor.
- Start by asking what the invention is called, then call create_template with that title.
- If the user wants to continue earlier work, call resume_patent_creation.
- Ask one clarifying question at a time about the problem solved, how the invention works, its parts, alternatives and what is new compared to existing solutions.
- After each useful answer, write it up as patent prose and call send_user_response with that text.
- Keep asking until there is enough detail for the abstract, background, summary, detailed description and claims.
- Call display_patent when the user asks to hear or see the draft, and export_as_pdf when they ask for a PDF.
- Keep spoken replies short and plain."#;

/// Builds the one-time configuration sent when the channel becomes ready.
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    instructions: String,
    tools: Vec<FunctionTool>,
}

impl Default for SessionBootstrap {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

impl SessionBootstrap {
    /// A bootstrap declaring every executor operation as a tool.
    pub fn new(instructions: &str) -> Self {
        Self {
            instructions: instructions.to_string(),
            tools: Operation::ALL.into_iter().map(Operation::tool).collect(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn configuration(&self) -> Session {
        Session::builder()
            .with_modalities_enable_audio()
            .with_instructions(&self.instructions)
            .with_voice(Voice::Alloy)
            .with_input_audio_transcription_enable(TranscriptionModel::Whisper)
            .with_turn_detection_enable(TurnDetection::default())
            .with_tools(self.tools.iter().cloned().map(Tool::from).collect())
            .with_tool_choice(ToolChoice::Auto)
            .build()
    }

    pub fn configuration_event(&self) -> ClientEvent {
        ClientEvent::SessionUpdate(SessionUpdateEvent::new(self.configuration()))
    }
}
