/// How the model decides the user has finished speaking.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad(ServerVadTurnDetection),
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::ServerVad(ServerVadTurnDetection::default())
    }
}

/// Voice activity detection run on the model side. Durations are in
/// milliseconds, `threshold` is in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerVadTurnDetection {
    threshold: f32,
    prefix_padding_ms: u32,
    silence_duration_ms: u32,
}

impl Default for ServerVadTurnDetection {
    // Long enough that an inventor pausing mid-explanation keeps the turn.
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 700,
        }
    }
}
