use super::*;
use crate::database::lancedb::{CodeRecord, CodeStore, StoredMatch};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSION: u32 = 4;

fn test_config(ollama_host: &str, ollama_port: u16, temp_dir: &TempDir) -> Config {
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.host = ollama_host.to_string();
    config.ollama.port = ollama_port;
    config.ollama.model = "test-model".to_string();
    config.ollama.embedding_dimension = DIMENSION;
    config
}

fn mock_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let address = server.address();
    test_config(&address.ip().to_string(), address.port(), temp_dir)
}

async fn seed_store(config: &Config, records: &[(&str, &str, [f32; 4])]) {
    let store = CodeStore::open_or_create(config)
        .await
        .expect("should create store");
    let records: Vec<CodeRecord> = records
        .iter()
        .map(|(filename, text, vector)| CodeRecord {
            filename: (*filename).to_string(),
            text: (*text).to_string(),
            vector: vector.to_vec(),
        })
        .collect();
    store.add_records(&records).await.expect("should seed store");
}

async fn post_retrieve(config: Config, body: serde_json::Value) -> (StatusCode, Vec<ContextItem>) {
    let app = create_app(Retriever::new(config).expect("should create retriever"));
    let request = Request::builder()
        .method("POST")
        .uri("/retrieve")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("should build request");

    let response = app.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    let items: Vec<ContextItem> = serde_json::from_slice(&bytes).expect("body should be a list");
    (status, items)
}

#[test]
fn search_text_prefers_query() {
    let request = RetrieveRequest {
        query: "parse config".to_string(),
        full_input: "@code parse config please".to_string(),
    };
    assert_eq!(request.search_text(), Some("parse config"));
}

#[test]
fn search_text_falls_back_to_full_input() {
    let request = RetrieveRequest {
        query: "   \n".to_string(),
        full_input: "where is the router built".to_string(),
    };
    assert_eq!(request.search_text(), Some("where is the router built"));
}

#[test]
fn search_text_none_when_both_blank() {
    let request = RetrieveRequest {
        query: " ".to_string(),
        full_input: "\t".to_string(),
    };
    assert_eq!(request.search_text(), None);
}

#[test]
fn request_fields_default_when_missing() {
    let request: RetrieveRequest =
        serde_json::from_str(r#"{"fullInput": "only this"}"#).expect("should parse");
    assert_eq!(request.query, "");
    assert_eq!(request.full_input, "only this");
}

#[test]
fn context_item_formats_distance_and_trims() {
    let item = ContextItem::from_match(StoredMatch {
        filename: "./src/app.py".to_string(),
        text: "\n  def main():\n      pass\n\n".to_string(),
        distance: 0.123_456,
    })
    .expect("non-blank chunk should map");

    assert_eq!(item.name, "./src/app.py");
    assert_eq!(item.description, "Similarity: 0.12");
    assert_eq!(item.content, "def main():\n      pass");
}

#[test]
fn blank_context_item_is_dropped() {
    let item = ContextItem::from_match(StoredMatch {
        filename: "empty.txt".to_string(),
        text: " \n\n ".to_string(),
        distance: 1.0,
    });
    assert!(item.is_none());
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let app = create_app(
        Retriever::new(test_config("localhost", 11434, &temp_dir)).expect("should create retriever"),
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("should build request"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("should be json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn blank_request_skips_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    let (status, items) = post_retrieve(
        mock_config(&server, &temp_dir),
        serde_json::json!({"query": "  ", "fullInput": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(items.is_empty());
}

#[tokio::test]
async fn full_input_is_embedded_when_query_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(serde_json::json!({
            "model": "test-model",
            "prompt": "how are chunks stored"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [1.0, 0.0, 0.0, 0.0]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = mock_config(&server, &temp_dir);
    seed_store(&config, &[("./store.py", "def add(): ...", [1.0, 0.0, 0.0, 0.0])]).await;

    let (status, items) = post_retrieve(
        config,
        serde_json::json!({"query": "", "fullInput": "how are chunks stored"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        items,
        vec![ContextItem {
            name: "./store.py".to_string(),
            description: "Similarity: 0.00".to_string(),
            content: "def add(): ...".to_string(),
        }]
    );
}

#[tokio::test]
async fn results_are_limited_ordered_and_blank_ones_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.0, 0.0, 0.0, 0.0]
        })))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = mock_config(&server, &temp_dir);
    seed_store(
        &config,
        &[
            ("blank.txt", "   \n", [0.0, 0.0, 0.0, 0.1]),
            ("one.py", "one", [0.0, 0.0, 0.0, 1.0]),
            ("two.py", "two", [0.0, 0.0, 0.0, 2.0]),
            ("three.py", "three", [0.0, 0.0, 0.0, 3.0]),
            ("four.py", "four", [0.0, 0.0, 0.0, 4.0]),
            ("five.py", "five", [0.0, 0.0, 0.0, 5.0]),
            ("six.py", "six", [0.0, 0.0, 0.0, 6.0]),
        ],
    )
    .await;

    let (status, items) = post_retrieve(
        config,
        serde_json::json!({"query": "anything", "fullInput": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["one.py", "two.py", "three.py", "four.py"]);
}

#[tokio::test]
async fn unreachable_embedding_service_returns_empty_list() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("should bind");
    let port = listener.local_addr().expect("should have address").port();
    drop(listener);

    let (status, items) = post_retrieve(
        test_config("127.0.0.1", port, &temp_dir),
        serde_json::json!({"query": "find the parser", "fullInput": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(items.is_empty());
}

#[tokio::test]
async fn missing_database_returns_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.5, 0.5, 0.5, 0.5]
        })))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    let (status, items) = post_retrieve(
        mock_config(&server, &temp_dir),
        serde_json::json!({"query": "find the parser", "fullInput": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(items.is_empty());
}
