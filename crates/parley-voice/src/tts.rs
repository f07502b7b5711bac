//! **Speech synthesis**: reply text to an MP3 on disk.
//!
//! `TtsBackend` produces bytes; `SpeechSynthesizer` owns the fixed prosody settings and
//! the write to the output path.

use crate::catalog::{Voice, VoiceSource, VoicesResponse};
use crate::error::{VoiceError, VoiceResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const VOICE_STABILITY: f32 = 0.30;
pub const VOICE_SIMILARITY: f32 = 0.75;

/// Prosody sent with every synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: VOICE_STABILITY,
            similarity_boost: VOICE_SIMILARITY,
        }
    }
}

/// Backend that turns text into encoded audio bytes.
#[async_trait::async_trait]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str, settings: &VoiceSettings) -> VoiceResult<Vec<u8>>;
}

/// Placeholder TTS: returns a fixed payload without calling anything.
#[derive(Debug, Clone)]
pub struct PlaceholderTts {
    pub payload: Vec<u8>,
}

impl Default for PlaceholderTts {
    fn default() -> Self {
        // ID3 tag header, enough for clients sniffing the type
        Self {
            payload: b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(&self, _text: &str, _voice_id: &str, _settings: &VoiceSettings) -> VoiceResult<Vec<u8>> {
        Ok(self.payload.clone())
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// Production TTS backend: ElevenLabs text-to-speech and voice listing.
#[derive(Debug, Clone)]
pub struct ElevenLabsTts {
    /// Base URL without trailing slash (e.g. https://api.elevenlabs.io).
    pub base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("TTS client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
impl TtsBackend for ElevenLabsTts {
    async fn synthesize(&self, text: &str, voice_id: &str, settings: &VoiceSettings) -> VoiceResult<Vec<u8>> {
        let url = self.url(&format!("text-to-speech/{}", voice_id));
        let res = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text,
                voice_settings: settings,
            })
            .send()
            .await
            .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::SynthesisFailed(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl VoiceSource for ElevenLabsTts {
    async fn list_voices(&self) -> VoiceResult<Vec<Voice>> {
        let res = self
            .client
            .get(self.url("voices"))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| VoiceError::CatalogUnavailable(e.to_string()))?;
        if !res.status().is_success() {
            return Err(VoiceError::CatalogUnavailable(format!("voices API error {}", res.status())));
        }
        let parsed: VoicesResponse = res
            .json()
            .await
            .map_err(|e| VoiceError::CatalogUnavailable(format!("voices parse failed: {}", e)))?;
        Ok(parsed.voices)
    }
}

/// Synthesizes with fixed prosody and writes the result to disk.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    backend: Arc<dyn TtsBackend>,
    settings: VoiceSettings,
}

impl SpeechSynthesizer {
    pub fn new(backend: Arc<dyn TtsBackend>) -> Self {
        Self {
            backend,
            settings: VoiceSettings::default(),
        }
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    /// Synthesize `text` with `voice_id` into `output_path`, creating parent directories.
    ///
    /// On any failure the file at `output_path` is removed so nothing half-written survives.
    pub async fn synthesize(&self, text: &str, voice_id: &str, output_path: &Path) -> VoiceResult<PathBuf> {
        let audio = self.backend.synthesize(text, voice_id, &self.settings).await?;
        debug!(target: "parley::tts", voice_id, bytes = audio.len(), path = %output_path.display(), "Writing reply audio");

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VoiceError::SynthesisFailed(format!("create {}: {}", parent.display(), e)))?;
        }
        if let Err(e) = tokio::fs::write(output_path, &audio).await {
            if let Err(rm) = tokio::fs::remove_file(output_path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(target: "parley::tts", "Could not remove partial output {}: {}", output_path.display(), rm);
                }
            }
            return Err(VoiceError::SynthesisFailed(format!("write {}: {}", output_path.display(), e)));
        }
        Ok(output_path.to_path_buf())
    }
}
