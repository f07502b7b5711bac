//! **Voice catalog**: the synthesis provider's voices, fetched once at startup.
//!
//! The catalog is an immutable value: build it with [`VoiceCatalog::fetch`] (best-effort)
//! and share it behind an `Arc`. Resolution never touches the network; an empty catalog
//! simply resolves every name to [`FALLBACK_VOICE_ID`].

use crate::error::VoiceResult;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Known-good provider voice used whenever the preferred voice cannot be found.
pub const FALLBACK_VOICE_ID: &str = "jIBWwhRngkm8so6GFCYC";

/// One entry of the provider's voice list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

/// Anything that can list voices (ElevenLabs in production, fixtures in tests).
#[async_trait::async_trait]
pub trait VoiceSource: Send + Sync {
    async fn list_voices(&self) -> VoiceResult<Vec<Voice>>;
}

/// Read-only voice list shared by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    /// Empty catalog; every resolution yields the fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch from `source`. Failure is logged and degrades to an empty catalog.
    pub async fn fetch(source: &dyn VoiceSource) -> Self {
        match source.list_voices().await {
            Ok(voices) => {
                info!(target: "parley::tts", count = voices.len(), "Voice catalog loaded");
                Self::new(voices)
            }
            Err(e) => {
                warn!(target: "parley::tts", "Using fallback voice: {}", e);
                Self::empty()
            }
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Voice name to use when none is configured: the first catalog entry, if any.
    pub fn default_name(&self) -> Option<&str> {
        self.voices.first().map(|v| v.name.as_str())
    }

    pub fn resolve(&self, preferred_name: &str) -> &str {
        resolve(preferred_name, &self.voices)
    }
}

/// Voice id for `preferred_name`, or [`FALLBACK_VOICE_ID`] when the catalog has no such voice.
pub fn resolve<'a>(preferred_name: &str, catalog: &'a [Voice]) -> &'a str {
    catalog
        .iter()
        .find(|v| v.name == preferred_name)
        .map(|v| v.voice_id.as_str())
        .unwrap_or(FALLBACK_VOICE_ID)
}

#[derive(Deserialize)]
pub(crate) struct VoicesResponse {
    #[serde(default)]
    pub voices: Vec<Voice>,
}
