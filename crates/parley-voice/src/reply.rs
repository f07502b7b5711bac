//! Reply generation: persona prompt + windowed history → one assistant reply.
//!
//! The persona turn is prepended here and nowhere else. It is not counted by the window
//! and never flows back to the caller.

use crate::conversation::{window, ConversationTurn, DEFAULT_HISTORY_LIMIT};
use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fixed character for the companion device.
pub const PERSONA_PROMPT: &str = "Your role is a pirate character called Jollybeard from a story book. \
Your objective is to be an entertaining companion to a 6 year old kid. \
You should respond to messages in a funny manner and your responses should include a lot of pirate slang such as matey, rrrrrrs, arrrrggghhh etc. \
Your responses should be short and witty and not exceed more than one or two sentences each time.";

/// Conversational, not reproducible: high-variance sampling is intended.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Chat-completion provider.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Return the content of a single reply to `messages`.
    async fn complete(&self, messages: &[ConversationTurn], temperature: f32) -> VoiceResult<String>;
}

/// Prepends the persona and bounds history before calling the chat backend.
#[derive(Clone)]
pub struct ReplyGenerator {
    backend: Arc<dyn ChatBackend>,
    persona: String,
    history_limit: usize,
    temperature: f32,
}

impl ReplyGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            persona: PERSONA_PROMPT.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Messages actually sent downstream: persona, then the windowed conversation.
    pub fn prompt_for(&self, conversation: &[ConversationTurn]) -> Vec<ConversationTurn> {
        let windowed = window(conversation, self.history_limit);
        let mut messages = Vec::with_capacity(windowed.len() + 1);
        messages.push(ConversationTurn::system(self.persona.clone()));
        messages.extend_from_slice(windowed);
        messages
    }

    pub async fn generate_reply(&self, conversation: &[ConversationTurn]) -> VoiceResult<String> {
        let messages = self.prompt_for(conversation);
        debug!(
            target: "parley::reply",
            original = conversation.len(),
            windowed = messages.len() - 1,
            "Generating reply"
        );
        let reply = self.backend.complete(&messages, self.temperature).await?;
        if reply.trim().is_empty() {
            return Err(VoiceError::ReplyGenerationFailed("empty completion".to_string()));
        }
        Ok(reply)
    }
}

// OpenAI-compatible request/response
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI Chat Completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("chat client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, messages: &[ConversationTurn], temperature: f32) -> VoiceResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::ReplyGenerationFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::ReplyGenerationFailed(format!(
                "Chat API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| VoiceError::ReplyGenerationFailed(format!("response parse failed: {}", e)))?;
        first_choice(parsed)
    }
}

fn first_choice(parsed: ChatResponse) -> VoiceResult<String> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VoiceError::ReplyGenerationFailed("no choices in response".to_string()))?;
    choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| VoiceError::ReplyGenerationFailed("empty completion".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use std::sync::Mutex;

    /// Records the messages it was called with and answers with a fixed line.
    #[derive(Default)]
    struct RecordingChat {
        seen: Mutex<Vec<Vec<ConversationTurn>>>,
    }

    #[async_trait::async_trait]
    impl ChatBackend for RecordingChat {
        async fn complete(&self, messages: &[ConversationTurn], _t: f32) -> VoiceResult<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok("Arrr, ahoy matey!".to_string())
        }
    }

    #[tokio::test]
    async fn persona_is_prepended_to_single_turn() {
        let chat = Arc::new(RecordingChat::default());
        let gen = ReplyGenerator::new(chat.clone());
        let reply = gen.generate_reply(&[ConversationTurn::user("hi")]).await.unwrap();
        assert!(!reply.is_empty());

        let seen = chat.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            vec![ConversationTurn::system(PERSONA_PROMPT), ConversationTurn::user("hi")]
        );
    }

    #[tokio::test]
    async fn persona_not_counted_against_window() {
        let chat = Arc::new(RecordingChat::default());
        let gen = ReplyGenerator::new(chat.clone());
        let history: Vec<_> = (0..30).map(|i| ConversationTurn::user(format!("m{}", i))).collect();
        gen.generate_reply(&history).await.unwrap();

        let seen = chat.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.len(), DEFAULT_HISTORY_LIMIT + 1);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "m10");
        assert_eq!(sent.iter().filter(|t| t.role == Role::System).count(), 1);
    }

    #[test]
    fn request_wire_format() {
        let msgs = vec![ConversationTurn::system("p"), ConversationTurn::user("hi")];
        let req = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &msgs,
            temperature: 1.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["temperature"], 1.0);
    }

    #[test]
    fn empty_choices_is_failure() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(parsed), Err(VoiceError::ReplyGenerationFailed(_))));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"Yo ho"}}]}"#).unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "Yo ho");
    }

    #[test]
    fn null_or_blank_content_is_failure() {
        for body in [
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":"  "}}]}"#,
        ] {
            let parsed: ChatResponse = serde_json::from_str(body).unwrap();
            assert!(matches!(first_choice(parsed), Err(VoiceError::ReplyGenerationFailed(_))), "{}", body);
        }
    }

    struct BlankChat;

    #[async_trait::async_trait]
    impl ChatBackend for BlankChat {
        async fn complete(&self, _messages: &[ConversationTurn], _t: f32) -> VoiceResult<String> {
            Ok("\n".to_string())
        }
    }

    #[tokio::test]
    async fn blank_reply_from_backend_is_failure() {
        let gen = ReplyGenerator::new(Arc::new(BlankChat));
        let err = gen.generate_reply(&[ConversationTurn::user("hi")]).await.unwrap_err();
        assert!(matches!(err, VoiceError::ReplyGenerationFailed(_)));
    }

    #[tokio::test]
    async fn custom_persona_replaces_default() {
        let chat = Arc::new(RecordingChat::default());
        let gen = ReplyGenerator::new(chat.clone()).with_persona("You are a parrot.");
        gen.generate_reply(&[ConversationTurn::user("hi")]).await.unwrap();

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0][0], ConversationTurn::system("You are a parrot."));
        assert_eq!(seen[0].len(), 2);
    }
}
