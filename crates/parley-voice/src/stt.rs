//! **Speech-to-Text (STT)**: turn a persisted upload into text for the reply generator.
//!
//! Implement `SttBackend` for a remote provider or a test double. The core never inspects
//! the audio encoding; format problems are the provider's to report.

use crate::error::{VoiceError, VoiceResult};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Backend for converting an audio file to text.
#[async_trait::async_trait]
pub trait SttBackend: Send + Sync {
    /// Transcribe the file at `audio_path`. Silence is `Ok(String::new())`, not an error.
    async fn transcribe(&self, audio_path: &Path) -> VoiceResult<String>;
}

/// Placeholder STT: returns a fixed string without reading the file.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    /// If set, return this instead of an empty transcript.
    pub response: Option<String>,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self {
            response: Some(s.into()),
        }
    }
}

#[async_trait::async_trait]
impl SttBackend for PlaceholderStt {
    async fn transcribe(&self, _audio_path: &Path) -> VoiceResult<String> {
        Ok(self.response.clone().unwrap_or_default())
    }
}

/// Production STT backend: OpenAI-compatible transcription API (`/audio/transcriptions`).
#[derive(Debug, Clone)]
pub struct OpenAiStt {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    api_key: String,
    /// Model: whisper-1 or gpt-4o-transcribe, etc.
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiStt {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("STT client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SttBackend for OpenAiStt {
    async fn transcribe(&self, audio_path: &Path) -> VoiceResult<String> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| VoiceError::TranscriptionFailed(format!("read {}: {}", audio_path.display(), e)))?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        debug!(target: "parley::stt", file = %file_name, bytes = bytes.len(), "Uploading audio for transcription");

        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::TranscriptionFailed(format!(
                "STT API error {}: {}",
                status, body
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;
        Ok(transcript_text(&json))
    }
}

/// `text` field of a transcription response; absent or non-string means nothing was heard.
fn transcript_text(json: &serde_json::Value) -> String {
    json.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}
