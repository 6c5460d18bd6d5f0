mod transcription;
mod turn_detection;

pub use transcription::InputAudioTranscription;
pub use turn_detection::{ServerVadTurnDetection, TurnDetection};

/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Voice {
    Alloy,
    Echo,
    Shimmer,
    Custom(String),
}

impl From<String> for Voice {
    fn from(s: String) -> Self {
        match s.as_str() {
            "alloy" => Voice::Alloy,
            "echo" => Voice::Echo,
            "shimmer" => Voice::Shimmer,
            _ => Voice::Custom(s),
        }
    }
}

impl From<Voice> for String {
    fn from(voice: Voice) -> Self {
        match voice {
            Voice::Alloy => "alloy".to_string(),
            Voice::Echo => "echo".to_string(),
            Voice::Shimmer => "shimmer".to_string(),
            Voice::Custom(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranscriptionModel {
    Whisper,
    Custom(String),
}

impl From<String> for TranscriptionModel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "whisper-1" => TranscriptionModel::Whisper,
            _ => TranscriptionModel::Custom(s),
        }
    }
}

impl From<TranscriptionModel> for String {
    fn from(model: TranscriptionModel) -> Self {
        match model {
            TranscriptionModel::Whisper => "whisper-1".to_string(),
            TranscriptionModel::Custom(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_serializes_as_lowercase_name() {
        assert_eq!(serde_json::to_string(&Voice::Alloy).unwrap(), "\"alloy\"");
        let voice: Voice = serde_json::from_str("\"coral\"").unwrap();
        assert_eq!(voice, Voice::Custom("coral".to_string()));
    }
}
