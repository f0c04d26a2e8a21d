#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Index a small project against a mocked Ollama, then query it over HTTP
use axum::body::Body;
use axum::http::{Request, StatusCode};
use code_rag::commands::{configure, index_directory};
use code_rag::config::{CONFIG_FILE_NAME, Config};
use code_rag::diagnostics::collect_database_report;
use code_rag::server::{ContextItem, Retriever, create_app};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Each marker word maps to its own axis so queries land on the matching file
const AXES: [(&str, [f32; 3]); 3] = [
    ("router", [1.0, 0.0, 0.0]),
    ("database", [0.0, 1.0, 0.0]),
    ("chunking", [0.0, 0.0, 1.0]),
];

async fn start_ollama() -> MockServer {
    let server = MockServer::start().await;
    for (word, vector) in AXES {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_string_contains(word))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": vector })))
            .mount(&server)
            .await;
    }
    server
}

fn write_project(root: &Path) {
    fs::create_dir_all(root.join("src")).expect("should create src");
    fs::create_dir_all(root.join("node_modules/dep")).expect("should create node_modules");
    fs::write(root.join("src/server.py"), "# router setup\napp = make_app()\n")
        .expect("should write file");
    fs::write(root.join("src/store.py"), "# database access\nconn = open()\n")
        .expect("should write file");
    fs::write(root.join("README.md"), "# chunking notes\nLines are grouped.\n")
        .expect("should write file");
    fs::write(root.join("node_modules/dep/index.js"), "// router clone\n")
        .expect("should write file");
}

fn test_config(state_dir: &Path, ollama: &MockServer) -> Config {
    let mut config = Config {
        base_dir: state_dir.to_path_buf(),
        ..Config::default()
    };
    config.ollama.host = ollama.address().ip().to_string();
    config.ollama.port = ollama.address().port();
    config.ollama.embedding_dimension = 3;
    config.server.top_k = 1;
    config
}

async fn retrieve(config: Config, query: &str) -> Vec<ContextItem> {
    let app = create_app(Retriever::new(config).expect("should create retriever"));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/retrieve")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"query": query, "fullInput": ""}).to_string(),
                ))
                .expect("should build request"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    serde_json::from_slice(&bytes).expect("response should be a list of context items")
}

#[tokio::test]
async fn index_then_retrieve_closest_file() {
    let ollama = start_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let project = temp_dir.path().join("project");
    let state = temp_dir.path().join("state");
    write_project(&project);
    let config = test_config(&state, &ollama);

    let stats = index_directory(config.clone(), &project)
        .await
        .expect("indexing should succeed");
    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.chunks_stored, 3);
    assert_eq!(stats.chunks_skipped, 0);

    let items = retrieve(config.clone(), "where is the database opened").await;
    assert_eq!(items.len(), 1);
    assert!(items[0].name.ends_with("store.py"));
    assert_eq!(items[0].content, "# database access\nconn = open()");
    assert_eq!(items[0].description, "Similarity: 0.00");

    let items = retrieve(config, "explain chunking").await;
    assert_eq!(items.len(), 1);
    assert!(items[0].name.ends_with("README.md"));
}

#[tokio::test]
async fn report_reflects_indexed_files() {
    let ollama = start_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let project = temp_dir.path().join("project");
    let state = temp_dir.path().join("state");
    write_project(&project);
    let config = test_config(&state, &ollama);

    index_directory(config.clone(), &project)
        .await
        .expect("indexing should succeed");

    let report = collect_database_report(&config)
        .await
        .expect("database should exist after indexing");
    assert_eq!(report.total_chunks, 3);
    assert_eq!(report.files.len(), 3);
    assert!(report.files.iter().all(|(name, count)| {
        !name.contains("node_modules") && *count == 1
    }));
}

#[tokio::test]
async fn indexing_a_missing_directory_fails() {
    let ollama = start_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path(), &ollama);

    let result = index_directory(config, &temp_dir.path().join("nope")).await;
    assert!(result.is_err());
}

#[test]
fn config_init_writes_loadable_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    configure(temp_dir.path(), true).expect("should write defaults");
    assert!(temp_dir.path().join(CONFIG_FILE_NAME).exists());

    let loaded = Config::load(temp_dir.path()).expect("should load written config");
    assert_eq!(loaded.server.port, 8000);
    assert_eq!(loaded.database.table_name, "code_chunks");

    assert!(configure(temp_dir.path(), true).is_err());
    configure(temp_dir.path(), false).expect("should show config");
}
