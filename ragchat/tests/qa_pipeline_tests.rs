//! Behaviour of the conversational QA pipeline against scripted providers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use ragchat::document::{Chunk, SearchResult};
use ragchat::embedding::EmbeddingProvider;
use ragchat::error::{RagError, Result};
use ragchat::history::{ConversationHistory, Turn};
use ragchat::inmemory::InMemoryVectorStore;
use ragchat::mock::{CallKind, MockChatModel, MockEmbeddingProvider};
use ragchat::vectorstore::VectorStore;
use ragchat::{ConversationalQa, PipelineConfig};

const DIM: usize = 256;

/// Records every text it embeds.
#[derive(Default)]
struct RecordingEmbedder {
    inner: MockEmbeddingProvider,
    texts: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingEmbedder {
    fn new() -> Self {
        Self { inner: MockEmbeddingProvider::new(DIM), ..Default::default() }
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "recording".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Records the requested `top_k` and ignores it, returning every chunk.
struct OverfetchingStore {
    chunks: Vec<Chunk>,
    requested: Mutex<Vec<usize>>,
}

#[async_trait]
impl VectorStore for OverfetchingStore {
    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn delete_origins(&self, _collection: &str, _origins: &[&str]) -> Result<usize> {
        Ok(0)
    }

    async fn search(
        &self,
        _collection: &str,
        _embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.requested.lock().unwrap().push(top_k);
        Ok(self.chunks.iter().cloned().map(|chunk| SearchResult { chunk, score: 1.0 }).collect())
    }
}

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        embedding: Vec::new(),
        metadata: HashMap::new(),
        document_id: id.to_string(),
    }
}

async fn knowledge_base(embedder: &RecordingEmbedder) -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection("kb", DIM).await.unwrap();
    let texts = [
        ("france", "Paris is the capital of France."),
        ("rome", "Rome has ancient ruins."),
        ("bread", "Sourdough needs a healthy starter."),
    ];
    let mut chunks = Vec::new();
    for (id, text) in texts {
        let mut c = chunk(id, text);
        c.embedding = embedder.inner.embed(text).await.unwrap();
        chunks.push(c);
    }
    store.upsert("kb", &chunks).await.unwrap();
    store
}

struct Fixture {
    qa: ConversationalQa,
    model: Arc<MockChatModel>,
    embedder: Arc<RecordingEmbedder>,
}

async fn fixture(model: MockChatModel) -> Fixture {
    let embedder = Arc::new(RecordingEmbedder::new());
    let store = knowledge_base(&embedder).await;
    let model = Arc::new(model);
    let qa = ConversationalQa::builder()
        .embedding_provider(embedder.clone())
        .vector_store(store)
        .chat_model(model.clone())
        .collection("kb")
        .build()
        .unwrap();
    Fixture { qa, model, embedder }
}

async fn drain(
    qa: &ConversationalQa,
    question: &str,
    history: &mut ConversationHistory,
    config: &PipelineConfig,
) -> Vec<Result<String>> {
    qa.answer(question, history, config).collect().await
}

#[tokio::test]
async fn capital_of_france_end_to_end() {
    let f = fixture(MockChatModel::new().with_fragments(["Paris", " is the capital of France."]))
        .await;
    let config = PipelineConfig::builder().top_k(1).build().unwrap();
    let mut history = ConversationHistory::new();

    let fragments = drain(&f.qa, "What is the capital of France?", &mut history, &config).await;
    let fragments: Vec<String> = fragments.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(fragments, vec!["Paris", " is the capital of France."]);

    let requests = f.model.calls_of(CallKind::Stream);
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system_prompt.ends_with("\n\nParis is the capital of France."));
    assert_eq!(requests[0].user_turn, "What is the capital of France?");
    assert!(requests[0].history.is_empty());

    assert_eq!(history.len(), 1);
    assert_eq!(history.turns()[0].question(), "What is the capital of France?");
    assert_eq!(history.turns()[0].answer(), "Paris is the capital of France.");
}

#[tokio::test]
async fn empty_history_skips_condensation() {
    let f = fixture(MockChatModel::new().with_condensed("unused").with_fragments(["ok"])).await;
    let mut history = ConversationHistory::new();

    drain(&f.qa, "Who wrote Dune?", &mut history, &PipelineConfig::default()).await;

    assert!(f.model.calls_of(CallKind::Complete).is_empty());
    assert_eq!(f.embedder.texts(), vec!["Who wrote Dune?"]);
}

#[tokio::test]
async fn follow_up_is_condensed_once_before_generation() {
    let f = fixture(
        MockChatModel::new()
            .with_condensed("When was Frank Herbert born?")
            .with_fragments(["1920."]),
    )
    .await;
    let mut history = ConversationHistory::from(vec![Turn::new("Who wrote Dune?", "Frank Herbert.")]);

    drain(&f.qa, "When was he born?", &mut history, &PipelineConfig::default()).await;

    let kinds: Vec<CallKind> = f.model.calls().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CallKind::Complete, CallKind::Stream]);

    let condense = &f.model.calls_of(CallKind::Complete)[0];
    assert_eq!(condense.user_turn, "When was he born?");
    assert_eq!(condense.history.len(), 2);

    // Retrieval uses the condensed query, generation the raw question.
    assert_eq!(f.embedder.texts(), vec!["When was Frank Herbert born?"]);
    let generate = &f.model.calls_of(CallKind::Stream)[0];
    assert_eq!(generate.user_turn, "When was he born?");
    assert_eq!(generate.history.len(), 2);

    assert_eq!(history.len(), 2);
    assert_eq!(history.turns()[1].answer(), "1920.");
}

#[tokio::test]
async fn dropping_the_stream_leaves_history_unchanged() {
    let f = fixture(MockChatModel::new().with_fragments(["Paris", " is", " lovely."])).await;
    let config = PipelineConfig::default();
    let mut history = ConversationHistory::from(vec![Turn::new("Hi", "Hello.")]);
    let before = history.clone();

    {
        let mut answer = f.qa.answer("What is the capital of France?", &mut history, &config);
        let first = answer.next().await.unwrap().unwrap();
        assert_eq!(first, "Paris");
    }
    assert_eq!(history, before);

    // A stream that is never polled issues no calls at all.
    let calls = f.model.calls().len();
    drop(f.qa.answer("Another question?", &mut history, &config));
    assert_eq!(f.model.calls().len(), calls);
    assert_eq!(history, before);
}

#[tokio::test]
async fn streamed_answer_matches_recorded_turn_byte_for_byte() {
    let fragments = ["Le ", "café ", "coûte ", "2 €", "\n", "— fin."];
    let f = fixture(MockChatModel::new().with_fragments(fragments)).await;
    let mut history = ConversationHistory::new();

    let streamed: String = drain(&f.qa, "Combien?", &mut history, &PipelineConfig::default())
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(streamed, fragments.concat());
    assert_eq!(history.turns()[0].answer().as_bytes(), streamed.as_bytes());
}

#[tokio::test]
async fn mid_stream_failure_is_partial_and_keeps_history() {
    let f = fixture(
        MockChatModel::new().with_fragments(["Paris", " is", " big"]).failing_stream_after(2, "reset"),
    )
    .await;
    let mut history = ConversationHistory::new();

    let items = drain(&f.qa, "Capital of France?", &mut history, &PipelineConfig::default()).await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[1].as_deref().unwrap(), " is");
    match &items[2] {
        Err(RagError::PartialStream { fragments, message }) => {
            assert_eq!(*fragments, 2);
            assert!(message.contains("reset"));
        }
        other => panic!("expected PartialStream, got {other:?}"),
    }
    assert!(history.is_empty());
}

#[tokio::test]
async fn failure_before_first_fragment_propagates_unmodified() {
    let f = fixture(MockChatModel::new().with_fragments(["x"]).failing_stream_after(0, "overloaded"))
        .await;
    let mut history = ConversationHistory::new();

    let items = drain(&f.qa, "Capital of France?", &mut history, &PipelineConfig::default()).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(RagError::ChatError { message, .. }) if message == "overloaded"));
    assert!(history.is_empty());
}

#[tokio::test]
async fn condensation_failure_aborts_before_retrieval() {
    let f = fixture(MockChatModel::new().failing_complete("rate limited").with_fragments(["x"])).await;
    let mut history = ConversationHistory::from(vec![Turn::new("q", "a")]);

    let items = drain(&f.qa, "And then?", &mut history, &PipelineConfig::default()).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(RagError::ChatError { .. })));
    assert!(f.embedder.texts().is_empty());
    assert!(f.model.calls_of(CallKind::Stream).is_empty());
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn embedding_failure_propagates_unmodified() {
    let embedder = Arc::new(RecordingEmbedder { fail: true, ..RecordingEmbedder::new() });
    let model = Arc::new(MockChatModel::new().with_fragments(["x"]));
    let qa = ConversationalQa::builder()
        .embedding_provider(embedder)
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .chat_model(model.clone())
        .build()
        .unwrap();
    let mut history = ConversationHistory::new();

    let items = drain(&qa, "Anything?", &mut history, &PipelineConfig::default()).await;

    match &items[..] {
        [Err(RagError::EmbeddingError { message, .. })] => assert_eq!(message, "quota exceeded"),
        other => panic!("unexpected items: {other:?}"),
    }
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn blank_question_is_a_no_op() {
    let f = fixture(MockChatModel::new().with_fragments(["x"])).await;
    let mut history = ConversationHistory::from(vec![Turn::new("q", "a")]);

    for question in ["", "   ", "\n\t"] {
        let items = drain(&f.qa, question, &mut history, &PipelineConfig::default()).await;
        assert!(items.is_empty());
    }
    assert!(f.model.calls().is_empty());
    assert!(f.embedder.texts().is_empty());
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn out_of_range_config_is_rejected_before_any_call() {
    let mut zero_top_k = PipelineConfig::default();
    zero_top_k.top_k = 0;
    let mut hot = PipelineConfig::default();
    hot.temperature = 7.0;
    let mut history = ConversationHistory::from(vec![Turn::new("Who wrote Dune?", "Frank Herbert.")]);

    for config in [zero_top_k, hot] {
        let f = fixture(MockChatModel::new().with_condensed("q").with_fragments(["x"])).await;
        let items = drain(&f.qa, "When was he born?", &mut history, &config).await;

        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)), "{err}");
        assert!(err.is_input_error());
        assert!(f.model.calls().is_empty());
        assert!(f.embedder.texts().is_empty());
        assert_eq!(history.len(), 1);
    }
}

#[tokio::test]
async fn retrieval_requests_and_returns_at_most_top_k() {
    let store = Arc::new(OverfetchingStore {
        chunks: (0..8).map(|i| chunk(&format!("c{i}"), &format!("passage {i}"))).collect(),
        requested: Mutex::new(Vec::new()),
    });
    let model = Arc::new(MockChatModel::new().with_fragments(["ok"]));
    let qa = ConversationalQa::builder()
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(DIM)))
        .vector_store(store.clone())
        .chat_model(model.clone())
        .build()
        .unwrap();
    let config = PipelineConfig::builder().top_k(3).build().unwrap();
    let mut history = ConversationHistory::new();

    drain(&qa, "Which passages?", &mut history, &config).await;

    assert_eq!(*store.requested.lock().unwrap(), vec![3]);
    let prompt = &model.calls_of(CallKind::Stream)[0].system_prompt;
    assert!(prompt.ends_with("passage 0\n\npassage 1\n\npassage 2"));
    assert!(!prompt.contains("passage 3"));

    let direct = qa.retrieve("Which passages?", 2).await.unwrap();
    assert_eq!(direct.len(), 2);
}

#[tokio::test]
async fn each_answer_call_reissues_model_calls() {
    let f = fixture(MockChatModel::new().with_fragments(["ok"])).await;
    let config = PipelineConfig::default();
    let mut first = ConversationHistory::new();
    let mut second = ConversationHistory::new();

    drain(&f.qa, "Capital of France?", &mut first, &config).await;
    drain(&f.qa, "Capital of France?", &mut second, &config).await;

    assert_eq!(f.model.calls_of(CallKind::Stream).len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn builder_requires_collaborators() {
    let err = ConversationalQa::builder().build().err().unwrap();
    assert!(matches!(err, RagError::ConfigError(_)));
}
