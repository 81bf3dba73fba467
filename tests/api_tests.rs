// INTEGRATION TESTS: HTTP surface of the text operations service
//
// Drives the real router with `tower::ServiceExt::oneshot` against a scripted
// model backend wrapped in the production retry decorator:
// 1. ENVELOPE: every operation answers with {statusCode, message, data}
// 2. SHAPING: count exactness, article length, keyword containment, label sets
// 3. FAILURES: validation (400), routing (404), backend down (502), hang (504)

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use ai_text_server::models::{
    Completion, DetectionScores, LabelScore, LocalModel, ModelClient, ModelOutput, ModelPayload,
    OperationKind, OutputSource, RetryPolicy, RetryingClient, SharedModelClient,
};
use ai_text_server::{create_router, AppState, Config, InvocationError};

type Responder =
    dyn Fn(usize, OperationKind, &ModelPayload) -> ai_text_server::Result<ModelOutput> + Send + Sync;

/// Backend whose answers are scripted per call.
struct ScriptedModel {
    calls: AtomicUsize,
    respond: Box<Responder>,
}

impl ScriptedModel {
    fn new(
        respond: impl Fn(usize, OperationKind, &ModelPayload) -> ai_text_server::Result<ModelOutput>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        })
    }

    fn happy() -> Arc<Self> {
        Self::new(|_, kind, payload| happy_path(kind, payload))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        _timeout: Duration,
    ) -> ai_text_server::Result<ModelOutput> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(attempt, kind, payload)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Scripted backend that takes `delay` to answer every call.
struct SlowModel {
    delay: Duration,
    scripted: Arc<ScriptedModel>,
}

#[async_trait]
impl ModelClient for SlowModel {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        timeout: Duration,
    ) -> ai_text_server::Result<ModelOutput> {
        tokio::time::sleep(self.delay).await;
        self.scripted.invoke(kind, payload, timeout).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Backend that never answers.
struct HangingModel;

#[async_trait]
impl ModelClient for HangingModel {
    async fn invoke(
        &self,
        _kind: OperationKind,
        _payload: &ModelPayload,
        _timeout: Duration,
    ) -> ai_text_server::Result<ModelOutput> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

fn chat_reply(kind: OperationKind) -> String {
    match kind {
        OperationKind::GenerateArticle => "Gardening rewards patience and careful planning. ".repeat(100),
        OperationKind::GenerateTitles => {
            "Here are your titles:\n1. Grow More With Less\n2. \"The Patient Gardener\"\n3. Soil First".to_string()
        }
        OperationKind::GenerateQuotes => "Courage is contagious.\nBe brave today.".to_string(),
        OperationKind::Rewrite => "Python is a joy to work with.".to_string(),
        OperationKind::ClassifyTicket => json!({
            "category": "Authentication Problem",
            "priority": "High",
            "department": "Security",
            "sentiment": "Negative",
            "keywords": ["login", "password", "sso"],
            "reasoning": "The user cannot log in."
        })
        .to_string(),
        OperationKind::ClassifyResume => json!({
            "overallScore": 78,
            "experienceAlignment": "Strong backend focus with relevant Rust experience.",
            "keyStrengths": ["Built Rust services", "Led migrations"],
            "criticalWeaknesses": ["Few metrics"],
            "skillGaps": ["Kubernetes"],
            "atsKeywords": ["rust", "tokio"],
            "topPriorityAction": "Add metrics to each role.",
            "nextStepAdvice": "Quantify impact for every project."
        })
        .to_string(),
        OperationKind::DocumentQa => "Python is used for machine learning and web development.".to_string(),
        _ => "ok".to_string(),
    }
}

fn happy_path(kind: OperationKind, payload: &ModelPayload) -> ai_text_server::Result<ModelOutput> {
    Ok(match payload {
        ModelPayload::DetectAi { .. } => ModelOutput::Detection(DetectionScores {
            ai_probability: 0.82,
            human_probability: 0.21,
            source: OutputSource::Model,
        }),
        ModelPayload::ZeroShot { labels, .. } => ModelOutput::Labels(
            labels
                .iter()
                .enumerate()
                .map(|(i, label)| LabelScore {
                    label: label.to_lowercase(),
                    score: if i == 1 { 0.9 } else { 0.02 },
                })
                .collect(),
        ),
        ModelPayload::Chat { .. } => ModelOutput::Completion(Completion {
            text: chat_reply(kind),
            source: OutputSource::Model,
        }),
    })
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.models.timeout_secs = 2;
    config.models.max_retries = 2;
    config.models.retry_backoff_ms = 1;
    config.uploads.max_file_bytes = 64 * 1024;
    config
}

fn app_with(backend: SharedModelClient) -> Router {
    let config = test_config();
    let policy = RetryPolicy {
        max_retries: config.models.max_retries,
        base_backoff: config.models.retry_backoff(),
    };
    let client: SharedModelClient = Arc::new(RetryingClient::new(backend, policy));
    create_router(AppState::new(client, config))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

const BOUNDARY: &str = "----ai-text-server-test-boundary";

async fn post_multipart(
    app: Router,
    path: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (StatusCode, Value) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((file_name, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// Minimal DOCX archive with one paragraph per entry.
fn docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn completion(text: &str) -> ai_text_server::Result<ModelOutput> {
    Ok(ModelOutput::Completion(Completion {
        text: text.to_string(),
        source: OutputSource::Model,
    }))
}

fn assert_failure(status: StatusCode, body: &Value, expected: StatusCode) {
    assert_eq!(status, expected);
    assert_eq!(body["statusCode"], expected.as_u16());
    assert!(body["data"].is_null());
    assert!(!body["message"].as_str().unwrap_or_default().is_empty());
}

fn words(text: &Value) -> usize {
    text.as_str().unwrap_or_default().split_whitespace().count()
}

const DETECT_TEXT: &str = "Artificial intelligence has transformed many industries. \
                           Companies deploy models to automate routine work and analyze data.";

// TEST SUITE 1: Detection and routing
mod detection_and_routing {
    use super::*;

    #[tokio::test]
    async fn test_detect_returns_full_envelope() {
        let (status, body) =
            post_json(app_with(ScriptedModel::happy()), "/api/ai/detect", json!({ "text": DETECT_TEXT })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["statusCode"], 200);
        assert!(!body["message"].as_str().unwrap().is_empty());
        let data = &body["data"];
        assert_eq!(data["detection"]["aiProbability"], 0.82);
        assert_eq!(data["detection"]["humanProbability"], 0.21);
        assert_eq!(data["detection"]["verdict"], "Likely AI-Generated");
        assert!(data["analysis"].is_object());
        assert!(data["indicators"].is_array());
        assert!(data["metadata"].is_object());

        println!("✅ Detection Envelope Test: PASSED");
    }

    #[tokio::test]
    async fn test_detect_validation_errors() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) = post_json(app.clone(), "/api/ai/detect", json!({ "text": "" })).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(app.clone(), "/api/ai/detect", json!({ "content": DETECT_TEXT })).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("text"));

        let (status, body) = post_json(app, "/api/ai/detect", json!({ "text": "only four words here" })).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_json_body_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/ai/detect")
            .header("content-type", "text/plain")
            .body(Body::from(DETECT_TEXT))
            .unwrap();
        let (status, body) = send(app_with(ScriptedModel::happy()), request).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_and_wrong_method_are_not_found() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) = post_json(app.clone(), "/api/ai/unknown", json!({})).await;
        assert_failure(status, &body, StatusCode::NOT_FOUND);

        let request = Request::builder()
            .method("GET")
            .uri("/api/ai/detect")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_failure(status, &body, StatusCode::NOT_FOUND);

        println!("✅ Routing Test: PASSED");
    }

    #[tokio::test]
    async fn test_health_is_plain_json() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app_with(ScriptedModel::happy()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["modelBackend"], "scripted");
    }
}

// TEST SUITE 2: Generation
mod generation {
    use super::*;

    #[tokio::test]
    async fn test_article_length_and_keywords_from_model() {
        let (status, body) = post_json(
            app_with(ScriptedModel::happy()),
            "/api/generate/article",
            json!({ "topic": "Sustainable Gardening", "keywords": "compost, Soil Health", "wordCount": 300 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        let article = data["article"].as_str().unwrap().to_lowercase();
        assert_eq!(words(&data["article"]), 300);
        assert_eq!(data["actualWordCount"], 300);
        assert_eq!(data["targetWordCount"], 300);
        assert!(article.contains("sustainable gardening"));
        assert!(article.contains("compost"));
        assert!(article.contains("soil health"));
        assert_eq!(data["keywords"], json!(["compost", "soil health"]));

        println!("✅ Article Length Test: PASSED");
    }

    #[tokio::test]
    async fn test_article_from_offline_backend_stays_within_target() {
        let (status, body) = post_json(
            app_with(Arc::new(LocalModel::new())),
            "/api/generate/article",
            json!({ "topic": "Remote Work", "keywords": ["async", "focus"] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let count = words(&body["data"]["article"]) as f64;
        assert!((450.0..=550.0).contains(&count), "got {count} words");
        assert!(body["data"]["article"].as_str().unwrap().contains("Remote Work"));
    }

    #[tokio::test]
    async fn test_article_rejects_non_positive_word_count() {
        let (status, body) = post_json(
            app_with(ScriptedModel::happy()),
            "/api/generate/article",
            json!({ "topic": "Gardening", "wordCount": 0 }),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_titles_exact_count() {
        let model = ScriptedModel::happy();
        let (status, body) = post_json(
            app_with(model.clone()),
            "/api/generate/titles",
            json!({ "topic": "Urban Gardening", "tone": "witty", "count": 7 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let titles = body["data"]["titles"].as_array().unwrap();
        assert_eq!(titles.len(), 7);
        assert_eq!(body["data"]["count"], 7);
        assert_eq!(titles[0], "Grow More With Less");
        assert_eq!(titles[1], "The Patient Gardener");
        let unique: std::collections::HashSet<String> =
            titles.iter().map(|t| t.as_str().unwrap().to_lowercase()).collect();
        assert_eq!(unique.len(), 7);
        assert!(titles.iter().all(|t| !t.as_str().unwrap().trim().is_empty()));
        // short list triggers exactly one regeneration
        assert_eq!(model.calls(), 2);

        println!("✅ Titles Count Test: PASSED");
    }

    #[tokio::test]
    async fn test_titles_count_is_validated() {
        let app = app_with(ScriptedModel::happy());
        for body in [
            json!({ "topic": "Gardening", "count": 0 }),
            json!({ "topic": "Gardening", "count": -2 }),
            json!({ "topic": "Gardening", "count": 51 }),
            json!({ "topic": "Gardening" }),
            json!({ "topic": "  ", "count": 3 }),
        ] {
            let (status, response) = post_json(app.clone(), "/api/generate/titles", body).await;
            assert_failure(status, &response, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_counts_accept_numeric_strings() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) = post_json(
            app.clone(),
            "/api/generate/titles",
            json!({ "topic": "Urban Gardening", "count": "5" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["titles"].as_array().unwrap().len(), 5);

        let (status, body) = post_json(
            app.clone(),
            "/api/generate/article",
            json!({ "topic": "Urban Gardening", "wordCount": "120" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["targetWordCount"], 120);

        let (status, body) = post_json(
            app,
            "/api/generate/quotes",
            json!({ "theme": "courage", "count": "lots" }),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("count"));
    }

    #[tokio::test]
    async fn test_taglines_exact_count() {
        let (status, body) = post_json(
            app_with(ScriptedModel::happy()),
            "/api/generate/quotes",
            json!({ "theme": "courage", "type": "tagline", "count": 5 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "tagline");
        assert_eq!(body["data"]["quotes"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_quotes_from_offline_backend() {
        let (status, body) = post_json(
            app_with(Arc::new(LocalModel::new())),
            "/api/generate/quotes",
            json!({ "theme": "persistence", "count": 12 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "quote");
        assert_eq!(body["data"]["quotes"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_rewrite_default_mode_and_invalid_mode() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) =
            post_json(app.clone(), "/api/generate/rewrite", json!({ "text": "Python is fun to use." })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["mode"], "standard");
        assert_eq!(body["data"]["rewrittenText"], "Python is a joy to work with.");
        assert_eq!(body["data"]["originalWordCount"], 5);

        let (status, body) = post_json(
            app,
            "/api/generate/rewrite",
            json!({ "text": "Python is fun.", "mode": "pirate" }),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rewrite_offline_is_never_empty() {
        let (status, body) = post_json(
            app_with(Arc::new(LocalModel::new())),
            "/api/generate/rewrite",
            json!({ "text": "We can't ship today.", "mode": "formal" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rewritten = body["data"]["rewrittenText"].as_str().unwrap();
        assert!(rewritten.contains("cannot"));
    }
}

// TEST SUITE 3: Classification
mod classification {
    use super::*;

    #[tokio::test]
    async fn test_ticket_from_model_json() {
        let (status, body) = post_json(
            app_with(ScriptedModel::happy()),
            "/api/classify/ticket",
            json!({ "text": "I cannot log in, SSO keeps failing", "userId": "u-42", "email": "a@b.io" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["category"], "Authentication Problem");
        assert_eq!(data["priority"], "High");
        assert_eq!(data["estimatedResponseTime"], "Within 4 hours");
        assert_eq!(data["metadata"]["userId"], "u-42");
        assert_eq!(data["metadata"]["source"], "model");
        assert!(data["keywords"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_ticket_falls_back_on_unparseable_output() {
        let model = ScriptedModel::new(|_, kind, payload| match payload {
            ModelPayload::Chat { .. } => Ok(ModelOutput::Completion(Completion {
                text: "I think this is about logins".into(),
                source: OutputSource::Model,
            })),
            _ => happy_path(kind, payload),
        });
        let (status, body) = post_json(
            app_with(model.clone()),
            "/api/classify/ticket",
            json!({ "text": "The app crashed and I lost my draft" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["metadata"]["source"], "fallback");
        assert_eq!(data["category"], "Feature Request");
        assert_eq!(data["priority"], "High");
        assert!(["Critical", "High", "Medium", "Low"].contains(&data["priority"].as_str().unwrap()));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_ticket_rejects_bad_email() {
        let (status, body) = post_json(
            app_with(ScriptedModel::happy()),
            "/api/classify/ticket",
            json!({ "text": "Help", "email": "not-an-email" }),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sentiment_label_and_confidence() {
        for app in [app_with(ScriptedModel::happy()), app_with(Arc::new(LocalModel::new()))] {
            let (status, body) =
                post_json(app, "/api/classify/sentiment", json!({ "text": "I love this product" })).await;
            assert_eq!(status, StatusCode::OK);
            let label = body["data"]["label"].as_str().unwrap();
            assert!(["Very Positive", "Positive", "Neutral", "Negative", "Very Negative"].contains(&label));
            let confidence = body["data"]["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&confidence));
        }
        println!("✅ Sentiment Label Test: PASSED");
    }

    #[tokio::test]
    async fn test_resume_analysis() {
        let resume = b"Senior Rust engineer. Built tokio services handling 10k rps. Led a Kafka migration.";
        let (status, body) = post_multipart(
            app_with(ScriptedModel::happy()),
            "/api/classify/resume",
            &[("jobTitle", "Backend Engineer")],
            Some(("cv.txt", "text/plain", &resume[..])),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["overallScore"], 78);
        assert_eq!(data["metadata"]["fileName"], "cv.txt");
        assert_eq!(data["metadata"]["jobTitle"], "Backend Engineer");
        assert_eq!(data["keyStrengths"][0], "Built Rust services");
        assert!(data["skillGaps"].as_array().unwrap().len() <= 6);
    }

    #[tokio::test]
    async fn test_resume_validation() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) = post_multipart(
            app.clone(),
            "/api/classify/resume",
            &[],
            Some(("cv.txt", "text/plain", &b"Rust engineer"[..])),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);

        let (status, body) =
            post_multipart(app.clone(), "/api/classify/resume", &[("jobTitle", "Engineer")], None).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);

        let (status, body) = post_multipart(
            app.clone(),
            "/api/classify/resume",
            &[("jobTitle", "Engineer")],
            Some(("cv.pdf", "application/pdf", &b"%PDF-1.7"[..])),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("PDF"));

        let (status, body) = post_multipart(
            app,
            "/api/classify/resume",
            &[("jobTitle", "Engineer")],
            Some(("cv.png", "image/png", &b"\x89PNG"[..])),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("image/png"));
    }

    #[tokio::test]
    async fn test_resume_from_docx_upload() {
        let resume = docx(&[
            "Senior Rust engineer.",
            "Built tokio services handling 10k rps and led a Kafka migration.",
        ]);
        let (status, body) = post_multipart(
            app_with(ScriptedModel::happy()),
            "/api/classify/resume",
            &[("jobTitle", "Backend Engineer")],
            Some((
                "cv.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                resume.as_slice(),
            )),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["overallScore"], 78);
        assert_eq!(body["data"]["metadata"]["fileName"], "cv.docx");
    }

    #[tokio::test]
    async fn test_empty_docx_is_rejected() {
        let resume = docx(&[]);
        let (status, body) = post_multipart(
            app_with(ScriptedModel::happy()),
            "/api/classify/resume",
            &[("jobTitle", "Backend Engineer")],
            Some(("cv.docx", "application/octet-stream", resume.as_slice())),
        )
        .await;

        assert_failure(status, &body, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("No extractable text"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let big = vec![b'a'; 70 * 1024];
        let (status, body) = post_multipart(
            app_with(ScriptedModel::happy()),
            "/api/classify/resume",
            &[("jobTitle", "Engineer")],
            Some(("cv.txt", "text/plain", big.as_slice())),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }
}

// TEST SUITE 4: Document QA
mod document_qa {
    use super::*;

    const DOC: &[u8] = b"Python is a programming language. It was created by Guido van Rossum. \
                         Python is widely used for machine learning.";

    #[tokio::test]
    async fn test_answer_is_grounded_offline() {
        let (status, body) = post_multipart(
            app_with(Arc::new(LocalModel::new())),
            "/api/assistant/respond",
            &[("user_input", "What is this document about?")],
            Some(("notes.txt", "text/plain", DOC)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["answer"].as_str().unwrap().contains("Python"));
        assert_eq!(body["data"]["fileInfo"]["name"], "notes.txt");
        assert_eq!(body["data"]["fileInfo"]["size"], DOC.len());
        assert_eq!(body["data"]["fileInfo"]["type"], "text/plain");

        println!("✅ Grounded Answer Test: PASSED");
    }

    #[tokio::test]
    async fn test_model_answer_is_returned() {
        let (status, body) = post_multipart(
            app_with(ScriptedModel::happy()),
            "/api/assistant/respond",
            &[("user_input", "What is Python used for?")],
            Some(("notes.txt", "text/plain", DOC)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["answer"],
            "Python is used for machine learning and web development."
        );
    }

    #[tokio::test]
    async fn test_missing_question_or_file() {
        let app = app_with(ScriptedModel::happy());
        let (status, body) = post_multipart(
            app.clone(),
            "/api/assistant/respond",
            &[("user_input", "   ")],
            Some(("notes.txt", "text/plain", DOC)),
        )
        .await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);

        let (status, body) =
            post_multipart(app, "/api/assistant/respond", &[("user_input", "What?")], None).await;
        assert_failure(status, &body, StatusCode::BAD_REQUEST);
    }
}

// TEST SUITE 5: Model failures
mod model_failures {
    use super::*;

    #[tokio::test]
    async fn test_backend_down_is_502_after_three_attempts() {
        let model = ScriptedModel::new(|_, _, _| {
            Err(InvocationError::Backend { status: 503, message: "overloaded".into() })
        });
        let (status, body) =
            post_json(app_with(model.clone()), "/api/ai/detect", json!({ "text": DETECT_TEXT })).await;

        assert_failure(status, &body, StatusCode::BAD_GATEWAY);
        assert_eq!(model.calls(), 3);

        println!("✅ Retry Exhaustion Test: PASSED");
    }

    #[tokio::test]
    async fn test_permanent_rejection_is_not_retried() {
        let model = ScriptedModel::new(|_, _, _| {
            Err(InvocationError::Backend { status: 401, message: "bad token".into() })
        });
        let (status, body) =
            post_json(app_with(model.clone()), "/api/classify/sentiment", json!({ "text": "fine" })).await;

        assert_failure(status, &body, StatusCode::BAD_GATEWAY);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_flaky_backend_recovers() {
        let model = ScriptedModel::new(|attempt, kind, payload| {
            if attempt < 2 {
                Err(InvocationError::Transport("connection reset".into()))
            } else {
                happy_path(kind, payload)
            }
        });
        let (status, body) =
            post_json(app_with(model.clone()), "/api/ai/detect", json!({ "text": DETECT_TEXT })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["statusCode"], 200);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_is_504() {
        let (status, body) = post_json(
            app_with(Arc::new(HangingModel)),
            "/api/generate/rewrite",
            json!({ "text": "Python is fun." }),
        )
        .await;

        assert_failure(status, &body, StatusCode::GATEWAY_TIMEOUT);

        println!("✅ Deadline Test: PASSED");
    }
}

// TEST SUITE 6: One model budget per request
mod request_budget {
    use super::*;
    use tokio::time::Instant;

    /// `test_config` allows 2s of model wait; timers tick in whole milliseconds.
    const BUDGET_LIMIT: Duration = Duration::from_millis(2050);

    fn slow(scripted: Arc<ScriptedModel>) -> Arc<SlowModel> {
        Arc::new(SlowModel { delay: Duration::from_millis(1500), scripted })
    }

    #[tokio::test(start_paused = true)]
    async fn test_titles_regeneration_stays_within_budget() {
        let scripted = ScriptedModel::new(|_, _, _| completion("1. Only One Title"));
        let started = Instant::now();
        let (status, body) = post_json(
            app_with(slow(scripted.clone())),
            "/api/generate/titles",
            json!({ "topic": "Rust", "count": 5 }),
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(status, StatusCode::OK);
        let titles = body["data"]["titles"].as_array().unwrap();
        assert_eq!(titles.len(), 5);
        assert_eq!(titles[0], "Only One Title");
        assert!(elapsed <= BUDGET_LIMIT, "took {elapsed:?}");
        assert_eq!(scripted.calls(), 1);

        println!("✅ Titles Budget Test: PASSED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticket_fallback_stays_within_budget() {
        let scripted = ScriptedModel::new(|_, kind, payload| match payload {
            ModelPayload::Chat { .. } => completion("Probably a login issue"),
            _ => happy_path(kind, payload),
        });
        let started = Instant::now();
        let (status, body) = post_json(
            app_with(slow(scripted.clone())),
            "/api/classify/ticket",
            json!({ "text": "I cannot log in, authentication keeps failing" }),
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["metadata"]["source"], "fallback");
        assert_eq!(data["category"], "Authentication Problem");
        assert_eq!(data["department"], "Security");
        assert!(elapsed <= BUDGET_LIMIT, "took {elapsed:?}");
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_second_attempt_stays_within_budget() {
        let scripted = ScriptedModel::new(|_, _, _| completion("Solid resume, nothing to add."));
        let started = Instant::now();
        let (status, body) = post_multipart(
            app_with(slow(scripted.clone())),
            "/api/classify/resume",
            &[("jobTitle", "Backend Engineer")],
            Some(("cv.txt", "text/plain", &b"Senior Rust engineer who built tokio services."[..])),
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["source"], "fallback");
        assert!(!body["data"]["keyStrengths"].as_array().unwrap().is_empty());
        assert!(elapsed <= BUDGET_LIMIT, "took {elapsed:?}");
        assert_eq!(scripted.calls(), 1);
    }
}
