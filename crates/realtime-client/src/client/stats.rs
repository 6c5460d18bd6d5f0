/// Token usage accumulated over every `response.done` seen on a connection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    total_tokens: i32,
    input_tokens: i32,
    output_tokens: i32,
    responses: u32,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, total: i32, input: i32, output: i32) {
        self.total_tokens += total;
        self.input_tokens += input;
        self.output_tokens += output;
        self.responses += 1;
    }

    pub fn total_tokens(&self) -> i32 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> i32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> i32 {
        self.output_tokens
    }

    pub fn responses(&self) -> u32 {
        self.responses
    }
}
