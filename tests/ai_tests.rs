// tests/ai_tests.rs

use std::sync::Arc;

use quizcraft::{ai::GeminiClient, config::Config, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

/// Spawns the app with the Gemini client pointed at `gemini_base_url`
/// (a wiremock server), or with no API key at all when `None`.
async fn spawn_app(gemini_base_url: Option<String>) -> String {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "ai_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        gemini_api_key: gemini_base_url.as_ref().map(|_| "test-key".to_string()),
        gemini_base_url,
    };

    let generator = Arc::new(GeminiClient::from_config(&config));
    let state = AppState {
        pool,
        config,
        generator,
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register_and_login(client: &reqwest::Client, address: &str) -> String {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}]
    })
}

#[tokio::test]
async fn ai_endpoints_require_auth() {
    let address = spawn_app(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/ai/generate", address))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn missing_api_key_is_reported_as_configuration_error() {
    let address = spawn_app(None).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let reply = client
        .post(format!("{}/api/ai/generate", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(reply["error"], "Gemini API key not set");
    assert!(reply.get("content").is_none());
}

#[tokio::test]
async fn generate_passes_the_prompt_through_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("```json\n[{\"title\": \"Insight\", \"description\": \"d\"}]\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let reply = client
        .post(format!("{}/api/ai/generate", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "prompt": "Analyze this survey" }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert!(reply.get("error").is_none());
    assert_eq!(reply["content"][0]["title"], "Insight");
}

#[tokio::test]
async fn generate_quiz_normalizes_the_draft() {
    let server = MockServer::start().await;
    // One option has no points field; normalization must default it to 0.
    let draft = r#"{
        "title": "Ocean Quiz",
        "description": "Generated",
        "questions": [
            {
                "text": "How deep is the Mariana Trench?",
                "options": [
                    { "text": "~11 km", "points": 3 },
                    { "text": "~2 km" }
                ]
            }
        ]
    }"#;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply(&format!("```json\n{}\n```", draft))),
        )
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let reply = client
        .post(format!("{}/api/ai/generate-quiz", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "topic": "oceans", "num_questions": 1 }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(reply["quiz"]["title"], "Ocean Quiz");
    let question = &reply["quiz"]["questions"][0];
    assert_eq!(question["marks"], 1); // defaulted
    assert_eq!(question["options"][0]["points"], 3);
    assert_eq!(question["options"][1]["points"], 0); // defaulted
}

#[tokio::test]
async fn generate_quiz_rejects_unusable_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("no json today")))
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let reply = client
        .post(format!("{}/api/ai/generate-quiz", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "topic": "oceans", "num_questions": 1 }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(reply["error"], "Could not parse AI result as quiz JSON");
}

#[tokio::test]
async fn quota_errors_surface_with_retry_hint() {
    let server = MockServer::start().await;
    let throttled = serde_json::json!({
        "error": {
            "code": 429,
            "message": "You exceeded your current quota.",
            "status": "RESOURCE_EXHAUSTED",
            "details": [{
                "@type": "type.googleapis.com/google.rpc.RetryInfo",
                "retryDelay": "0.05s"
            }]
        }
    });
    // max_retries = 1 -> exactly two upstream attempts
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(&throttled))
        .expect(2)
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let response = client
        .post(format!("{}/api/ai/generate", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "prompt": "hello", "max_retries": 1 }))
        .send()
        .await
        .unwrap();
    // Upstream failure is data, not an HTTP error
    assert_eq!(response.status().as_u16(), 200);

    let reply = response.json::<serde_json::Value>().await.unwrap();
    let error = reply["error"].as_str().unwrap().to_lowercase();
    assert!(error.contains("quota exceeded"));
    assert_eq!(reply["retry_after_ms"], 50);
}

#[tokio::test]
async fn extend_questions_returns_the_new_drafts() {
    let server = MockServer::start().await;
    let questions = r#"[
        { "text": "What causes tides?", "options": [ { "text": "The Moon", "points": 2 } ] }
    ]"#;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(questions)))
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let reply = client
        .post(format!("{}/api/ai/extend-questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Oceans",
            "description": "Intro",
            "questions": [
                { "text": "Existing?", "options": [ { "text": "Yes", "points": 1 } ] }
            ],
            "count": 1
        }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(reply["questions"][0]["text"], "What causes tides?");
    assert_eq!(reply["questions"][0]["marks"], 1);
}

#[tokio::test]
async fn analyze_needs_collected_responses() {
    let server = MockServer::start().await;
    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let created = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Lonely quiz",
            "questions": [
                { "text": "Anyone?", "options": [ { "text": "No", "points": 0 } ] }
            ]
        }))
        .send()
        .await
        .unwrap();
    let quiz_id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let response = client
        .post(format!("{}/api/quizzes/{}/analyze", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn advice_endpoint_summarizes_one_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "[{\"title\": \"Keep going\", \"description\": \"Solid answers.\"}]",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let address = spawn_app(Some(server.uri())).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    // Create and publish a one-question quiz
    let created = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": "Tiny quiz",
            "questions": [
                { "text": "Ready?", "options": [ { "text": "Yes", "points": 2 } ] }
            ]
        }))
        .send()
        .await
        .unwrap();
    let quiz_id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let detail = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let question_id = detail["questions"][0]["id"].as_i64().unwrap();
    let option_id = detail["questions"][0]["options"][0]["id"].as_i64().unwrap();

    client
        .put(format!("{}/api/quizzes/{}/publish", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "is_published": true }))
        .send()
        .await
        .unwrap();

    let submitted = client
        .post(format!("{}/api/public/quizzes/{}/responses", address, quiz_id))
        .json(&serde_json::json!({
            "respondent_name": "Sam",
            "answers": [ { "question_id": question_id, "option_id": option_id } ]
        }))
        .send()
        .await
        .unwrap();
    let response_id = submitted.json::<serde_json::Value>().await.unwrap()["response_id"]
        .as_i64()
        .unwrap();

    let reply = client
        .post(format!(
            "{}/api/public/quizzes/{}/responses/{}/advice",
            address, quiz_id, response_id
        ))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(reply["content"][0]["title"], "Keep going");
}
