//! Turn Orchestrator - composes transcription, reply generation and synthesis
//!
//! Two flows:
//! - transcribe-only: upload → STT → text
//! - full turn: (sweep) → (upload → STT) → window + persona → completion → TTS → reply reference
//!
//! Every step's error aborts the rest. Upload files are released on every exit path by
//! their guard; output files are only kept once synthesis has completed.

use crate::catalog::VoiceCatalog;
use crate::conversation::{ConversationTurn, DEFAULT_HISTORY_LIMIT};
use crate::ephemeral::{EphemeralStore, FilePurpose};
use crate::error::{VoiceError, VoiceResult};
use crate::reply::ReplyGenerator;
use crate::stt::SttBackend;
use crate::tts::SpeechSynthesizer;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Route prefix under which synthesized replies are served.
pub const LISTEN_PREFIX: &str = "/listen";

/// Configuration for the turn orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Preferred synthesis voice name. Empty means "first voice in the catalog".
    pub voice_name: String,
    /// Sweep `outputs/` before answering a JSON conversation.
    pub sweep_on_ask: bool,
    /// Sweep `outputs/` before answering an audio upload.
    pub sweep_on_conversation: bool,
    /// Outputs younger than this survive a sweep. Zero sweeps everything.
    pub output_min_age: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            voice_name: "Raj".to_string(),
            sweep_on_ask: true,
            sweep_on_conversation: false,
            output_min_age: Duration::ZERO,
        }
    }
}

/// Reply text plus the opaque reference to its audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyResult {
    pub text: String,
    /// `/listen/<id>.mp3`
    pub audio: String,
    #[serde(skip)]
    pub audio_id: String,
}

/// The turn-processing pipeline
#[derive(Clone)]
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    stt: Arc<dyn SttBackend>,
    replies: ReplyGenerator,
    synthesizer: SpeechSynthesizer,
    catalog: Arc<VoiceCatalog>,
    files: EphemeralStore,
}

impl TurnOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        stt: Arc<dyn SttBackend>,
        replies: ReplyGenerator,
        synthesizer: SpeechSynthesizer,
        catalog: Arc<VoiceCatalog>,
        files: EphemeralStore,
    ) -> Self {
        if replies.history_limit() != DEFAULT_HISTORY_LIMIT {
            info!(target: "parley::turn", limit = replies.history_limit(), "Non-default history window");
        }
        Self {
            config,
            stt,
            replies,
            synthesizer,
            catalog,
            files,
        }
    }

    pub fn files(&self) -> &EphemeralStore {
        &self.files
    }

    /// Voice name actually in use after applying the catalog default.
    pub fn voice_name(&self) -> &str {
        if self.config.voice_name.is_empty() {
            self.catalog.default_name().unwrap_or("")
        } else {
            &self.config.voice_name
        }
    }

    pub fn voice_id(&self) -> &str {
        self.catalog.resolve(self.voice_name())
    }

    /// Persist `audio`, transcribe it, and delete it again whatever the outcome.
    pub async fn transcribe_upload(&self, audio: &[u8]) -> VoiceResult<String> {
        let upload = self.files.persist_upload(audio).await?;
        let result = self.stt.transcribe(upload.path()).await;
        upload.release().await;
        match &result {
            Ok(text) if text.is_empty() => debug!(target: "parley::turn", "Empty transcript"),
            Ok(text) => debug!(target: "parley::turn", chars = text.len(), "Transcribed upload"),
            Err(e) => warn!(target: "parley::turn", "Transcription failed: {}", e),
        }
        result
    }

    /// Full turn from a fresh audio upload: the transcript becomes a single user turn.
    pub async fn respond_to_audio(&self, audio: &[u8]) -> VoiceResult<ReplyResult> {
        if self.config.sweep_on_conversation {
            self.sweep_outputs().await;
        }
        let transcript = self.transcribe_upload(audio).await?;
        self.reply_with_audio(&[ConversationTurn::user(transcript)]).await
    }

    /// Full turn from a caller-assembled conversation.
    pub async fn respond(&self, conversation: &[ConversationTurn]) -> VoiceResult<ReplyResult> {
        if self.config.sweep_on_ask {
            self.sweep_outputs().await;
        }
        self.reply_with_audio(conversation).await
    }

    /// Bytes of a previously returned reply. Swept or unknown ids are `OutputNotFound`.
    pub async fn open_output(&self, id: &str) -> VoiceResult<Vec<u8>> {
        let path = self.files.resolve_output(id).await?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VoiceError::OutputNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sweep_outputs(&self) -> usize {
        self.files
            .sweep_older_than(FilePurpose::Output, self.config.output_min_age)
            .await
    }

    async fn reply_with_audio(&self, conversation: &[ConversationTurn]) -> VoiceResult<ReplyResult> {
        let text = self.replies.generate_reply(conversation).await?;

        let output = self.files.allocate_output().await?;
        let voice_id = self.voice_id();
        self.synthesizer.synthesize(&text, voice_id, output.path()).await?;
        let file = output
            .commit()
            .ok_or_else(|| VoiceError::SynthesisFailed("output file lost".to_string()))?;

        info!(target: "parley::turn", audio = %file.id, "Reply ready");
        Ok(ReplyResult {
            text,
            audio: format!("{}/{}", LISTEN_PREFIX, file.id),
            audio_id: file.id,
        })
    }
}
