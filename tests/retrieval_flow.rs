//! End-to-end retrieval tests over a deterministic in-process embedder, so
//! no network or API key is needed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use policyquery_backend::answer::parse_query;
use policyquery_backend::core::config::{AppPaths, ConfigService};
use policyquery_backend::core::errors::ApiError;
use policyquery_backend::core::security::init_api_token;
use policyquery_backend::document::{parse_document, Chunker, ChunkerConfig};
use policyquery_backend::llm::{EmbedTask, LlmProvider};
use policyquery_backend::retrieval::SessionRegistry;
use policyquery_backend::server::handlers::bulk::{run_bulk, RunRequest};
use policyquery_backend::state::AppState;

const EMBED_DIM: usize = 512;

/// Deterministic bag-of-words embedder: each word is hashed into a fixed
/// dimension and the vector is L2-normalized, so shared vocabulary means
/// nearby vectors. Generation replies come from a scripted queue.
struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| s.to_string()).collect()),
        }
    }

    fn embed_only() -> Self {
        Self::new(Vec::new())
    }
}

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0f32; EMBED_DIM];
    let lowered = text.to_lowercase();
    for word in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let idx = (fnv1a(word) % EMBED_DIM as u64) as usize;
        vector[idx] += 1.0;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn embedding_model(&self) -> &str {
        "hash-embedder"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn embed(&self, inputs: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|text| embed_text(text)).collect())
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ApiError> {
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .ok_or_else(|| ApiError::Upstream("no scripted response left".to_string()))
    }
}

fn test_state(provider: Arc<dyn LlmProvider>, data_dir: &std::path::Path) -> AppState {
    let paths = Arc::new(AppPaths::with_data_dir(
        data_dir.to_path_buf(),
        data_dir.to_path_buf(),
    ));
    let config = ConfigService::new(paths.clone());
    let retrieval = config.retrieval().unwrap();
    let registry = SessionRegistry::new(
        retrieval.session_capacity,
        retrieval.session_idle,
        None,
        provider.embedding_model().to_string(),
    );

    AppState {
        paths,
        config,
        api_token: init_api_token(Some("test-token".to_string())),
        provider,
        registry,
        retrieval,
    }
}

/// A policy document whose clause 4.1 paragraph lands at the start of its
/// own chunk: the paragraphs before it overrun the overlap budget when the
/// first chunk closes, so nothing trails into the second chunk ahead of the
/// clause heading.
fn policy_text() -> String {
    let p1 = "Hospital cash benefit. Company shall pay a daily allowance for each \
completed day of inpatient confinement at a network facility. Claims must reach us \
within thirty days of discharge together with a discharge summary and all original \
bills. Payments go only to a registered bank account held by a proposer. \
Pre-authorization requests must reach our assistance desk at least forty-eight \
hours before any planned admission. Emergency admissions must be notified within \
twenty-four hours of arrival at a network facility. All payments remain subject to \
deduction of non-medical items as itemized in an annexure to our schedule.";
    let p2 = "Maternity expenses including delivery charges and lawful medical \
termination of pregnancy shall become payable only after twenty-four consecutive \
calendar months of continuous cover and remain subject to sub-limits stated in our \
schedule of benefits.";
    let p3 = "4.1 Waiting period is 36 months for pre-existing diseases. A waiting \
period of thirty-six months applies from inception of first cover.";
    let p4 = "Exclusions. Cosmetic surgery, dental treatment without admission, and \
injuries arising from hazardous sports are excluded, as are war and nuclear perils.";

    format!("{}\n\n{}\n\n{}\n\n{}", p1, p2, p3, p4)
}

#[tokio::test]
async fn search_before_build_fails_with_not_built() {
    let provider = ScriptedProvider::embed_only();
    let registry = SessionRegistry::new(
        16,
        std::time::Duration::from_secs(3600),
        None,
        "hash-embedder".to_string(),
    );

    let handle = registry.get_or_create("fresh-session");
    let result = handle.search(&provider, "anything", 5).await;

    match result {
        Err(ApiError::NotFound(msg)) => assert!(msg.contains("not built"), "msg was {}", msg),
        other => panic!("expected not-built error, got {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn build_then_search_succeeds() {
    let provider = ScriptedProvider::embed_only();
    let registry = SessionRegistry::new(
        16,
        std::time::Duration::from_secs(3600),
        None,
        "hash-embedder".to_string(),
    );
    let chunker = Chunker::new(ChunkerConfig::default());

    let handle = registry.get_or_create("s1");
    let chunks = chunker.chunk("The grace period for premium payment is thirty days.", "p.txt");
    handle.rebuild(&provider, chunks).await.unwrap();

    let results = handle.search(&provider, "grace period", 5).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.content.contains("grace period"));
}

#[tokio::test]
async fn search_returns_all_entries_when_top_k_exceeds_count() {
    let provider = ScriptedProvider::embed_only();
    let registry = SessionRegistry::new(
        16,
        std::time::Duration::from_secs(3600),
        None,
        "hash-embedder".to_string(),
    );
    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: 60,
        chunk_overlap: 0,
    });

    let handle = registry.get_or_create("s1");
    let chunks = chunker.chunk(
        "Premiums are payable annually.\n\nCover ceases upon fraud.\n\nNotices go to the insured.",
        "p.txt",
    );
    let count = handle.rebuild(&provider, chunks).await.unwrap();
    assert!(count <= 5);

    let results = handle.search(&provider, "premium", 5).await.unwrap();

    assert_eq!(results.len(), count);
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn rebuild_discards_prior_chunks() {
    let provider = ScriptedProvider::embed_only();
    let registry = SessionRegistry::new(
        16,
        std::time::Duration::from_secs(3600),
        None,
        "hash-embedder".to_string(),
    );
    let chunker = Chunker::new(ChunkerConfig::default());

    let handle = registry.get_or_create("s1");
    handle
        .rebuild(&provider, chunker.chunk("Old document about maternity cover.", "old.txt"))
        .await
        .unwrap();
    handle
        .rebuild(&provider, chunker.chunk("New document about dental cover.", "new.txt"))
        .await
        .unwrap();

    let results = handle
        .search(&provider, "maternity dental cover", 10)
        .await
        .unwrap();

    assert!(!results.is_empty());
    for result in &results {
        assert_eq!(result.chunk.document_name, "new.txt");
    }
}

#[tokio::test]
async fn waiting_period_query_retrieves_clause_4_1() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("policy.txt");
    std::fs::write(&doc_path, policy_text()).unwrap();

    let provider = ScriptedProvider::embed_only();
    let chunker = Chunker::new(ChunkerConfig::default());
    let registry = SessionRegistry::new(
        16,
        std::time::Duration::from_secs(3600),
        None,
        "hash-embedder".to_string(),
    );

    let raw_text = parse_document(&doc_path).unwrap();
    let chunks = chunker.chunk(&raw_text, "policy.txt");
    assert!(chunks.len() > 1);

    let handle = registry.get_or_create("ui-session");
    handle.rebuild(&provider, chunks).await.unwrap();

    let results = handle
        .search(&provider, "what is the waiting period", 5)
        .await
        .unwrap();

    let top = &results[0];
    assert_eq!(top.chunk.clause_number, "4.1");
    assert!(top.chunk.content.contains("36 months"));
}

async fn serve_text(content: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/policy.txt", get(move || async move { content }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/policy.txt", addr)
}

fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/policy.txt", port)
}

#[tokio::test]
async fn bulk_run_fails_whole_request_when_one_url_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::embed_only());
    let state = test_state(provider, dir.path());

    let good_url = serve_text("The grace period for premium payment is thirty days.").await;
    let bad_url = unreachable_url();

    let result = run_bulk(
        &state,
        RunRequest {
            documents: vec![good_url, bad_url.clone()],
            questions: vec!["what is the grace period".to_string()],
        },
    )
    .await;

    match result {
        Err(ApiError::BadRequest(msg)) => {
            assert!(msg.contains(&bad_url), "msg was {}", msg);
        }
        other => panic!("expected bad-request error, got {:?}", other.map(|r| r.answers)),
    }
    // Ingestion aborted before any session was created.
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn bulk_run_degrades_failed_questions_to_placeholder_answers() {
    let answer_json = r#"{
        "decision": "Information Provided",
        "justification": "The grace period for premium payment is thirty days.",
        "amount": null,
        "conditions": null,
        "referenced_clauses": [
            { "clause_number": "Part_1", "text": "thirty days", "document_name": "policy.txt" }
        ]
    }"#;
    // One valid reply for the first question, then garbage for the second
    // question's initial attempt and both repair re-prompts.
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
        answer_json,
        "not json",
        "still not json",
        "never json",
    ]));

    let dir = tempfile::tempdir().unwrap();
    let state = test_state(provider, dir.path());

    let url = serve_text("The grace period for premium payment is thirty days.").await;
    let second_question = "does the policy cover air ambulance transfers".to_string();

    let response = run_bulk(
        &state,
        RunRequest {
            documents: vec![url],
            questions: vec!["what is the grace period".to_string(), second_question.clone()],
        },
    )
    .await
    .unwrap();

    assert_eq!(response.answers.len(), 2);
    assert_eq!(
        response.answers[0],
        "The grace period for premium payment is thirty days."
    );
    assert_eq!(
        response.answers[1],
        format!(
            "An error occurred while processing the question: '{}'",
            second_question
        )
    );
}

#[tokio::test]
async fn parsed_query_builds_a_richer_search_string() {
    let provider = ScriptedProvider::new(vec![
        r#"{"intent": "condition_retrieval", "details": {"topic": "waiting period"}}"#,
    ]);

    let parsed = parse_query(&provider, "what is the waiting period")
        .await
        .unwrap();

    assert_eq!(parsed.intent, "condition_retrieval");
    let search = parsed.search_string();
    assert!(search.contains("Intent: condition_retrieval"));
    assert!(search.contains("topic: waiting period"));
}
