//! # Parley Voice - turn-processing core
//!
//! Turns one spoken utterance into one spoken reply for a companion device: speech-to-text,
//! a persona-constrained chat completion over a bounded history window, and text-to-speech
//! written to a short-lived MP3 the client fetches afterwards.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── TurnOrchestrator ─────────────────────────────┐
//! │                                                                            │
//! │  audio bytes ─→ EphemeralStore ─→ SttBackend ─→ window(20) + persona       │
//! │               (uploads/, guard)   (Whisper)          │                      │
//! │                                                      ↓                      │
//! │  /listen/<id>.mp3 ←─ EphemeralStore ←─ SpeechSynthesizer ←─ ChatBackend     │
//! │                     (outputs/, sweep)   (ElevenLabs,        (OpenAI)        │
//! │                                          VoiceCatalog)                      │
//! └────────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod conversation;
pub mod ephemeral;
pub mod error;
pub mod orchestrator;
pub mod reply;
pub mod stt;
pub mod tts;

pub use catalog::{resolve, Voice, VoiceCatalog, VoiceSource, FALLBACK_VOICE_ID};
pub use conversation::{window, Conversation, ConversationTurn, Role, DEFAULT_HISTORY_LIMIT};
pub use ephemeral::{EphemeralAudioFile, EphemeralStore, FilePurpose, OutputGuard, UploadGuard};
pub use error::{VoiceError, VoiceResult};
pub use orchestrator::{OrchestratorConfig, ReplyResult, TurnOrchestrator, LISTEN_PREFIX};
pub use reply::{ChatBackend, OpenAiChat, ReplyGenerator, DEFAULT_TEMPERATURE, PERSONA_PROMPT};
pub use stt::{OpenAiStt, PlaceholderStt, SttBackend};
pub use tts::{ElevenLabsTts, PlaceholderTts, SpeechSynthesizer, TtsBackend, VoiceSettings};
