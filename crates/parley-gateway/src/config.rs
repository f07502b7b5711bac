//! Gateway configuration.
//!
//! Precedence: defaults < TOML file (`PARLEY_CONFIG`, default `config/parley`) < `PARLEY_*`
//! environment variables. API keys are read from the environment only and never logged.

use parley_voice::{OrchestratorConfig, VoiceError, DEFAULT_HISTORY_LIMIT, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// | Key | Default | Description |
/// |-----|---------|-------------|
/// | host / port | 127.0.0.1 / 5000 | Listen address. |
/// | data_dir | . | Root holding `uploads/` and `outputs/`. |
/// | voice_name | Raj | Preferred synthesis voice; empty = first catalog voice. |
/// | history_limit | 20 | Caller turns forwarded to the completion service. |
/// | sweep_on_ask / sweep_on_conversation | true / false | Clear `outputs/` before a reply. |
/// | output_min_age_secs | 0 | Outputs younger than this survive a sweep. |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    pub voice_name: String,
    pub history_limit: usize,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub sweep_on_ask: bool,
    pub sweep_on_conversation: bool,
    pub output_min_age_secs: u64,
    pub stt_model: String,
    pub chat_model: String,
    pub openai_api_url: String,
    pub elevenlabs_api_url: String,
}

impl GatewayConfig {
    /// Load from `PARLEY_CONFIG` (or `config/parley`) and the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("PARLEY_CONFIG").unwrap_or_else(|_| "config/parley".to_string());
        Self::load_from(&path)
    }

    /// Load with `path` as the optional file source. A missing file is not an error.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 5000_i64)?
            .set_default("data_dir", ".")?
            .set_default("voice_name", "Raj")?
            .set_default("history_limit", DEFAULT_HISTORY_LIMIT as i64)?
            .set_default("temperature", DEFAULT_TEMPERATURE as f64)?
            .set_default("request_timeout_secs", 60_i64)?
            .set_default("max_upload_bytes", 25 * 1024 * 1024_i64)?
            .set_default("sweep_on_ask", true)?
            .set_default("sweep_on_conversation", false)?
            .set_default("output_min_age_secs", 0_i64)?
            .set_default("stt_model", "whisper-1")?
            .set_default("chat_model", "gpt-3.5-turbo")?
            .set_default("openai_api_url", "https://api.openai.com/v1")?
            .set_default("elevenlabs_api_url", "https://api.elevenlabs.io")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            voice_name: self.voice_name.trim().to_string(),
            sweep_on_ask: self.sweep_on_ask,
            sweep_on_conversation: self.sweep_on_conversation,
            output_min_age: Duration::from_secs(self.output_min_age_secs),
        }
    }
}

/// Provider keys, from the environment (after `.env` is loaded).
#[derive(Clone)]
pub struct Secrets {
    pub openai_api_key: String,
    pub elevenlabs_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &"<redacted>")
            .field("elevenlabs_api_key", &self.elevenlabs_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, VoiceError> {
        let openai_api_key = env_opt_string("OPENAI_API_KEY")
            .ok_or_else(|| VoiceError::Config("OPENAI_API_KEY is required".to_string()))?;
        Ok(Self {
            openai_api_key,
            elevenlabs_api_key: env_opt_string("ELEVENLABS_API_KEY"),
        })
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
