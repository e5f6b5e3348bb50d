//! End-to-end pipeline tests over a temporary TEI corpus.
//!
//! The embedding and generation backends are replaced with deterministic
//! stubs so ingestion, retrieval, and answer binding can be exercised
//! without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use paper_rag::answer::{AnswerBinder, NO_CONTEXT_ANSWER};
use paper_rag::chat::Conversation;
use paper_rag::config::Config;
use paper_rag::embedding::EmbeddingProvider;
use paper_rag::error::{Error, Result};
use paper_rag::generation::GenerationProvider;
use paper_rag::index::{SqliteIndex, VectorStore};
use paper_rag::ingest::Ingestor;
use paper_rag::models::ChatMessage;
use paper_rag::retrieve::Retriever;

/// Deterministic embedder: one axis per topic keyword, plus a constant
/// bias so unrelated texts still have a nonzero vector.
struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let axis = |keyword: &str| if lower.contains(keyword) { 1.0 } else { 0.0 };
                vec![axis("mitochondria"), axis("photosynthesis"), 0.1]
            })
            .collect())
    }
}

/// Generator stub that records every call and returns a canned answer.
struct RecordingGenerator {
    reply: String,
    calls: AtomicUsize,
    messages: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

fn tei(title: &str, abstract_text: &str, body_paragraph: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc><titleStmt><title>{title}</title></titleStmt></fileDesc>
    <profileDesc><abstract><p>{abstract_text}</p></abstract></profileDesc>
  </teiHeader>
  <text><body>
    <div><head>Results</head><p>{body_paragraph}</p></div>
  </body></text>
</TEI>"#
    )
}

fn write_corpus(dir: &TempDir) {
    std::fs::write(
        dir.path().join("mito.tei.xml"),
        tei(
            "Mitochondrial Dynamics",
            "We study mitochondria under stress.",
            "The mitochondria fragmented after treatment.",
        ),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("photo.tei.xml"),
        tei(
            "Leaf Photosynthesis",
            "We study photosynthesis in maize.",
            "Rates of photosynthesis doubled under light.",
        ),
    )
    .unwrap();
    std::fs::write(dir.path().join("broken.tei.xml"), "<TEI><teiHeader>").unwrap();
}

async fn ingested_index(tei_dir: &TempDir, db_dir: &TempDir) -> Arc<SqliteIndex> {
    let store = Arc::new(
        SqliteIndex::create(db_dir.path(), "papers")
            .await
            .unwrap(),
    );
    let ingestor = Ingestor::new(Config::default(), store.clone(), Arc::new(StubEmbedder));
    let report = ingestor.run(tei_dir.path()).await.unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.documents, 2);
    assert_eq!(report.skipped, 1);
    store
}

#[tokio::test]
async fn ingest_is_idempotent_across_reruns() {
    let tei_dir = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write_corpus(&tei_dir);

    let store = ingested_index(&tei_dir, &db_dir).await;
    let first_count = store.count().await.unwrap();
    // Each good document yields an abstract chunk and a results chunk.
    assert_eq!(first_count, 4);

    let query = StubEmbedder.embed(&["mitochondria".to_string()]).await.unwrap();
    let first_ids: Vec<String> = store
        .query(&query[0], 10)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();

    // Re-running the same batch replaces rather than accumulates.
    let ingestor = Ingestor::new(Config::default(), store.clone(), Arc::new(StubEmbedder));
    ingestor.run(tei_dir.path()).await.unwrap();

    assert_eq!(store.count().await.unwrap(), first_count);
    let second_ids: Vec<String> = store
        .query(&query[0], 10)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn retrieval_orders_by_relevance_and_binds_labels() {
    let tei_dir = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write_corpus(&tei_dir);

    let store = ingested_index(&tei_dir, &db_dir).await;
    let retriever = Retriever::new(store, Arc::new(StubEmbedder));

    let contexts = retriever
        .retrieve("what happens to mitochondria?", 2)
        .await
        .unwrap();
    assert_eq!(contexts.len(), 2);
    for chunk in &contexts {
        assert_eq!(chunk.meta.paper_id, "mito");
        assert_eq!(chunk.meta.title, "Mitochondrial Dynamics");
    }
    // Equal scores fall back to id order.
    assert_eq!(contexts[0].id, "mito::sec_0::chunk_0");
    assert_eq!(contexts[1].id, "mito::sec_1::chunk_0");

    let generator = Arc::new(RecordingGenerator::new(
        "Mitochondria fragmented [S2], as hypothesized [S1].",
    ));
    let binder = AnswerBinder::new(generator.clone());
    let grounded = binder
        .answer("what happens to mitochondria?", contexts.clone())
        .await
        .unwrap();

    assert_eq!(grounded.answer, "Mitochondria fragmented [S2], as hypothesized [S1].");
    assert_eq!(grounded.contexts, contexts);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    // The composed prompt labels chunks positionally, each label followed
    // by that chunk's text.
    let recorded = generator.messages.lock().unwrap();
    let user = &recorded[0][1].content;
    let s1 = user.find("[S1]").unwrap();
    let s2 = user.find("[S2]").unwrap();
    assert!(s1 < s2);
    assert!(user[s1..s2].contains(&contexts[0].text));
    assert!(user[s2..].contains(&contexts[1].text));
}

#[tokio::test]
async fn empty_collection_short_circuits_generation() {
    let db_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteIndex::create(db_dir.path(), "papers")
            .await
            .unwrap(),
    );
    let retriever = Retriever::new(store, Arc::new(StubEmbedder));

    let contexts = retriever.retrieve("anything", 5).await.unwrap();
    assert!(contexts.is_empty());

    let generator = Arc::new(RecordingGenerator::new("unused"));
    let binder = AnswerBinder::new(generator.clone());
    let grounded = binder.answer("anything", contexts).await.unwrap();

    assert_eq!(grounded.answer, NO_CONTEXT_ANSWER);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn querying_an_uninitialized_collection_is_not_found() {
    let db_dir = TempDir::new().unwrap();
    let err = SqliteIndex::open(db_dir.path(), "papers").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn conversation_accumulates_grounded_turns() {
    let tei_dir = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write_corpus(&tei_dir);

    let store = ingested_index(&tei_dir, &db_dir).await;
    let retriever = Retriever::new(store, Arc::new(StubEmbedder));
    let binder = AnswerBinder::new(Arc::new(RecordingGenerator::new("It fragments [S1].")));

    let mut conversation = Conversation::new();
    let question = "what happens to mitochondria?";
    conversation.record_user(question);
    let contexts = retriever.retrieve(question, 3).await.unwrap();
    let grounded = binder.answer(question, contexts).await.unwrap();
    conversation.record_assistant(&grounded);

    assert_eq!(conversation.len(), 2);
    let assistant = &conversation.turns()[1];
    assert_eq!(assistant.content, "It fragments [S1].");
    let stored = assistant.contexts.as_ref().unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].id, "mito::sec_0::chunk_0");
}
