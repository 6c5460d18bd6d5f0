use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_BASE_URL: &str = "wss://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Where and as whom to connect. The key is kept secret and never printed.
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Config {
    pub fn new(api_key: &str) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(api_key.to_string()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/realtime?model={}", self.base_url, self.model)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url_and_model() {
        let config = Config::new("sk-test")
            .with_base_url("wss://example.test/v1/")
            .with_model("test-model");
        assert_eq!(config.endpoint(), "wss://example.test/v1/realtime?model=test-model");
        assert!(config.has_api_key());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let printed = format!("{:?}", Config::new("sk-very-secret"));
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains(DEFAULT_MODEL));
    }
}
