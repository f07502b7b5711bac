//! Shared handler state and its construction from configuration.

use crate::config::{GatewayConfig, Secrets};
use parley_voice::{
    EphemeralStore, ElevenLabsTts, OpenAiChat, OpenAiStt, ReplyGenerator, SpeechSynthesizer,
    TurnOrchestrator, VoiceCatalog, VoiceResult,
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: TurnOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wire the production backends. The voice catalog is fetched here, once; failure
    /// leaves it empty and every reply uses the fallback voice.
    pub async fn from_config(config: &GatewayConfig, secrets: &Secrets) -> VoiceResult<Self> {
        let timeout = config.request_timeout();

        let stt = OpenAiStt::new(
            &config.openai_api_url,
            &secrets.openai_api_key,
            &config.stt_model,
            timeout,
        )?;
        let chat = OpenAiChat::new(
            &config.openai_api_url,
            &secrets.openai_api_key,
            &config.chat_model,
            timeout,
        )?;
        let tts = ElevenLabsTts::new(
            &config.elevenlabs_api_url,
            secrets.elevenlabs_api_key.clone().unwrap_or_default(),
            timeout,
        )?;

        let catalog = if secrets.elevenlabs_api_key.is_some() {
            VoiceCatalog::fetch(&tts).await
        } else {
            info!(target: "parley::gateway", "ELEVENLABS_API_KEY not set; voice catalog left empty");
            VoiceCatalog::empty()
        };

        let replies = ReplyGenerator::new(Arc::new(chat))
            .with_history_limit(config.history_limit)
            .with_temperature(config.temperature);

        let orchestrator = TurnOrchestrator::new(
            config.orchestrator_config(),
            Arc::new(stt),
            replies,
            SpeechSynthesizer::new(Arc::new(tts)),
            Arc::new(catalog),
            EphemeralStore::new(config.data_dir()),
        );
        info!(
            target: "parley::gateway",
            voice = orchestrator.voice_name(),
            voice_id = orchestrator.voice_id(),
            "Voice selected"
        );
        Ok(Self::new(orchestrator))
    }
}
