//! Parley Gateway: HTTP surface for the voice turn pipeline.
//! Config-driven via GatewayConfig; remote providers are wired once at startup.

mod config;
mod error;
mod handlers;
mod state;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Method, Request},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use config::{GatewayConfig, Secrets};
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // API keys stay in the backend; the page never sees them.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[parley-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    let secrets = Secrets::from_env()?;
    let state = AppState::from_config(&config, &secrets).await?;
    let app = build_app(state, config.max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(target: "parley::gateway", "Parley listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(target: "parley::gateway", "Ctrl+C handler failed: {}", e);
            }
            tracing::info!(target: "parley::gateway", "Shutdown requested");
        })
        .await?;
    Ok(())
}

fn build_app(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/transcribe", post(handlers::transcribe))
        .route("/conversation", post(handlers::conversation))
        .route("/ask", post(handlers::ask))
        .route("/listen/:id", get(handlers::listen))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::info!(target: "parley::gateway", "{} {} -> {}", method, path, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use parley_voice::{
        ChatBackend, ConversationTurn, EphemeralStore, OrchestratorConfig, PlaceholderStt,
        PlaceholderTts, ReplyGenerator, SpeechSynthesizer, TurnOrchestrator, VoiceCatalog,
        VoiceError, VoiceResult,
    };
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "parley-test-boundary";

    struct PirateChat;

    #[async_trait::async_trait]
    impl ChatBackend for PirateChat {
        async fn complete(&self, _messages: &[ConversationTurn], _t: f32) -> VoiceResult<String> {
            Ok("Shiver me timbers!".to_string())
        }
    }

    struct DownChat;

    #[async_trait::async_trait]
    impl ChatBackend for DownChat {
        async fn complete(&self, _messages: &[ConversationTurn], _t: f32) -> VoiceResult<String> {
            Err(VoiceError::ReplyGenerationFailed("upstream 502".into()))
        }
    }

    struct EmptyChat;

    #[async_trait::async_trait]
    impl ChatBackend for EmptyChat {
        async fn complete(&self, _messages: &[ConversationTurn], _t: f32) -> VoiceResult<String> {
            Ok(String::new())
        }
    }

    fn test_app(root: &Path, chat: Arc<dyn ChatBackend>) -> Router {
        test_app_with(root, chat, OrchestratorConfig::default())
    }

    fn test_app_with(root: &Path, chat: Arc<dyn ChatBackend>, config: OrchestratorConfig) -> Router {
        let orchestrator = TurnOrchestrator::new(
            config,
            Arc::new(PlaceholderStt::with_response("ahoy there")),
            ReplyGenerator::new(chat),
            SpeechSynthesizer::new(Arc::new(PlaceholderTts::default())),
            Arc::new(VoiceCatalog::empty()),
            EphemeralStore::new(root),
        );
        build_app(AppState::new(orchestrator), 1024 * 1024)
    }

    fn multipart(field: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"rec.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/placeholder")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn to(mut req: Request<Body>, uri: &str) -> Request<Body> {
        *req.uri_mut() = uri.parse().unwrap();
        req
    }

    fn ask_request(json: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(res: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    fn dir_len(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn transcribe_without_file_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));

        let res = app
            .clone()
            .oneshot(to(multipart("other", b"x"), "/transcribe"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "No file found");

        let not_multipart = Request::builder()
            .method("POST")
            .uri("/transcribe")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(not_multipart).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "No file found");
    }

    #[tokio::test]
    async fn transcribe_returns_text_and_removes_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));

        let res = app.oneshot(to(multipart("file", b"RIFF"), "/transcribe")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["text"], "ahoy there");
        assert_eq!(dir_len(&tmp.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn conversation_returns_reply_and_playable_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));

        let res = app
            .clone()
            .oneshot(to(multipart("file", b"RIFF"), "/conversation"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["text"], "Shiver me timbers!");
        let audio = json["audio"].as_str().unwrap().to_string();
        assert!(audio.starts_with("/listen/") && audio.ends_with(".mp3"));

        let res = app.oneshot(get_request(&audio)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "audio/mpeg");
        assert_eq!(body_bytes(res).await, PlaceholderTts::default().payload);
    }

    #[tokio::test]
    async fn ask_then_listen_and_sweep_race_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));
        let convo = serde_json::json!({ "conversation": [{ "role": "user", "content": "hi" }] });

        let first = body_json(app.clone().oneshot(ask_request(convo.clone())).await.unwrap()).await;
        let first_audio = first["audio"].as_str().unwrap().to_string();
        assert_eq!(app.clone().oneshot(get_request(&first_audio)).await.unwrap().status(), StatusCode::OK);

        let second = body_json(app.clone().oneshot(ask_request(convo)).await.unwrap()).await;
        let second_audio = second["audio"].as_str().unwrap().to_string();

        let res = app.clone().oneshot(get_request(&first_audio)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.oneshot(get_request(&second_audio)).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ask_without_conversation_key_still_replies() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));
        let res = app.oneshot(ask_request(serde_json::json!({}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ask_with_malformed_json_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));
        let req = Request::builder()
            .method("POST")
            .uri("/ask")
            .body(Body::from("{not json"))
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_is_server_error_without_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(DownChat));
        let res = app
            .oneshot(ask_request(serde_json::json!({ "conversation": [{ "role": "user", "content": "hi" }] })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert!(json.get("audio").is_none());
        assert!(json["error"].as_str().unwrap().contains("Reply generation failed"));
        assert_eq!(dir_len(&tmp.path().join("outputs")), 0);
    }

    #[tokio::test]
    async fn listen_rejects_unknown_and_traversal_ids() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("outputs")).unwrap();
        std::fs::write(tmp.path().join("secret.mp3"), b"nope").unwrap();
        let app = test_app(&tmp.path().join("data"), Arc::new(PirateChat));

        for uri in [
            "/listen/00000000-0000-4000-8000-000000000000.mp3",
            "/listen/..%2Fsecret.mp3",
            "/listen/not-a-uuid",
        ] {
            let res = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn health_and_index() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(PirateChat));

        let res = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(body_bytes(res).await, b"OK");

        let res = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(res).await).unwrap();
        assert!(html.contains(r#"data-voice="Raj">Raj</strong>"#));
    }

    #[tokio::test]
    async fn index_escapes_voice_name() {
        let tmp = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig {
            voice_name: r#"Cap'n "Hook" <b>"#.to_string(),
            ..OrchestratorConfig::default()
        };
        let app = test_app_with(tmp.path(), Arc::new(PirateChat), config);

        let res = app.oneshot(get_request("/")).await.unwrap();
        let html = String::from_utf8(body_bytes(res).await).unwrap();
        assert!(!html.contains("<b>"));
        assert!(!html.contains(r#""Hook""#));
        assert!(html.contains("Cap&#39;n &quot;Hook&quot; &lt;b&gt;"));
    }

    #[tokio::test]
    async fn empty_completion_is_server_error_without_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(tmp.path(), Arc::new(EmptyChat));
        let res = app
            .oneshot(ask_request(serde_json::json!({ "conversation": [{ "role": "user", "content": "hi" }] })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(res).await.get("audio").is_none());
        assert_eq!(dir_len(&tmp.path().join("outputs")), 0);
    }
}
