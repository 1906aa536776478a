use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use story_relay::tts::piper::samples_to_wav;
use story_relay::tts::{LazyPiperSynthesizer, SynthesisError};
use story_relay::{
    create_relay_router, ChatConfig, CompletionClient, RelayState, RetentionPolicy, SpeechRelay,
    Synthesizer,
};

/// Stand-in for the completion API: counts calls, records the last request, replies with a fixed body.
#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<(HeaderMap, Value)>>>,
    status: StatusCode,
    body: String,
}

impl Upstream {
    fn replying(status: StatusCode, body: &str) -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            last: Arc::new(Mutex::new(None)),
            status,
            body: body.to_string(),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    *upstream.last.lock().unwrap() = Some((headers, body));
    (upstream.status, upstream.body.clone())
}

async fn spawn_upstream(upstream: &Upstream) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(upstream.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/chat/completions", addr)
}

struct Tone;

impl Synthesizer for Tone {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let samples: Vec<f32> = (0..text.len() * 100)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect();
        samples_to_wav(&samples, 16000)
    }
}

struct Mute;

impl Synthesizer for Mute {
    fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SynthesisError> {
        Err(SynthesisError::Inference("model not loaded".into()))
    }
}

fn relay_state(
    endpoint: &str,
    synthesizer: Box<dyn Synthesizer>,
    audio_dir: &Path,
) -> Arc<RelayState> {
    let chat = CompletionClient::new(ChatConfig {
        endpoint: endpoint.to_string(),
        api_key: "test-key".to_string(),
        model: "test/model".to_string(),
        referer: "http://localhost:5000".to_string(),
        title: "Relay Tests".to_string(),
    });
    Arc::new(RelayState {
        chat,
        speech: SpeechRelay::new(synthesizer, audio_dir, RetentionPolicy::KeepAll),
    })
}

async fn post_json(state: &Arc<RelayState>, uri: &str, body: Value) -> Response {
    create_relay_router(Arc::clone(state))
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn chat_returns_first_completion() {
    let upstream = Upstream::replying(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":"Hello there!"}},{"message":{"role":"assistant","content":"ignored"}}]}"#,
    );
    let endpoint = spawn_upstream(&upstream).await;
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state(&endpoint, Box::new(Tone), dir.path());

    let response = post_json(&state, "/chat", json!({"message": "Hi"})).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"response": "Hello there!"}));
    assert_eq!(upstream.hits(), 1);

    let (headers, sent) = upstream.last.lock().unwrap().clone().unwrap();
    assert_eq!(headers[header::AUTHORIZATION], "Bearer test-key");
    assert_eq!(headers["x-title"], "Relay Tests");
    assert_eq!(sent["model"], "test/model");
    assert_eq!(sent["messages"], json!([{"role": "user", "content": "Hi"}]));
}

#[tokio::test]
async fn empty_message_never_reaches_upstream() {
    let upstream = Upstream::replying(StatusCode::OK, "{}");
    let endpoint = spawn_upstream(&upstream).await;
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state(&endpoint, Box::new(Tone), dir.path());

    for body in [json!({"message": ""}), json!({"message": "   "}), json!({})] {
        let response = post_json(&state, "/chat", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No message provided");
    }

    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn malformed_completion_is_a_format_error() {
    for reply in [
        r#"{"choices":[]}"#,
        r#"{"choices":[{"message":{"role":"assistant"}}]}"#,
        r#"{"error":"quota"}"#,
        "<html>not json</html>",
    ] {
        let upstream = Upstream::replying(StatusCode::OK, reply);
        let endpoint = spawn_upstream(&upstream).await;
        let dir = tempfile::tempdir().unwrap();
        let state = relay_state(&endpoint, Box::new(Tone), dir.path());

        let response = post_json(&state, "/chat", json!({"message": "Hi"})).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "reply {reply}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "UPSTREAM_FORMAT");
        assert_eq!(body["error"], "Unexpected response format.");
    }
}

#[tokio::test]
async fn upstream_error_status_is_unavailable() {
    let upstream = Upstream::replying(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
    let endpoint = spawn_upstream(&upstream).await;
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state(&endpoint, Box::new(Tone), dir.path());

    let response = post_json(&state, "/chat", json!({"message": "Hi"})).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
    assert_eq!(body["error"], "Failed to connect to the API.");
}

#[tokio::test]
async fn unreachable_upstream_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let endpoint = format!("http://{}/chat/completions", addr);
    let state = relay_state(&endpoint, Box::new(Tone), dir.path());

    let response = post_json(&state, "/chat", json!({"message": "Hi"})).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state("http://127.0.0.1:9/unused", Box::new(Tone), dir.path());

    for body in [json!({"text": ""}), json!({"text": " \n\t "}), json!({})] {
        let response = post_json(&state, "/tts", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No text provided");
    }

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn tts_creates_distinct_servable_files() {
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state("http://127.0.0.1:9/unused", Box::new(Tone), dir.path());

    let mut urls = Vec::new();
    for _ in 0..2 {
        let response = post_json(&state, "/tts", json!({"text": "Same words"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let url = body_json(response).await["audio_url"]
            .as_str()
            .unwrap()
            .to_string();
        urls.push(url);
    }

    assert_ne!(urls[0], urls[1]);
    for url in &urls {
        let file_name = url.strip_prefix("/static/").unwrap();
        assert!(dir.path().join(file_name).is_file());

        let response = create_relay_router(Arc::clone(&state))
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.starts_with(b"RIFF"));
    }
}

#[tokio::test]
async fn synthesis_failure_is_reported_generically() {
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state("http://127.0.0.1:9/unused", Box::new(Mute), dir.path());

    let response = post_json(&state, "/tts", json!({"text": "Hello"})).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "TTS_ERROR");
    assert_eq!(body["error"], "Failed to generate TTS.");
}

#[tokio::test]
async fn chat_keeps_working_while_voice_is_missing() {
    let upstream = Upstream::replying(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":"Still here"}}]}"#,
    );
    let endpoint = spawn_upstream(&upstream).await;
    let voices = tempfile::tempdir().unwrap();
    let audio = tempfile::tempdir().unwrap();
    let synthesizer = LazyPiperSynthesizer::new(voices.path(), "missing-voice");
    assert!(synthesizer.preload().is_err());
    let state = relay_state(&endpoint, Box::new(synthesizer), audio.path());

    let response = post_json(&state, "/tts", json!({"text": "Hello"})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "TTS_ERROR");

    let response = post_json(&state, "/chat", json!({"message": "Hi"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"response": "Still here"}));
}

#[tokio::test]
async fn index_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let state = relay_state("http://127.0.0.1:9/unused", Box::new(Tone), dir.path());

    let response = create_relay_router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("<html"));
}
