//! End-to-end integration tests for the Caduceus chat pipeline.
//!
//! These tests exercise the full path from user input to generator call:
//! reference matching, dictionary and chain lookups through the cache,
//! relevance selection, prompt composition and budget trimming.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use caduceus_agent::{
    ChatPipeline, EstimateCounter, EvidenceAggregator, PipelineSettings, PromptComposer,
    ReferenceLibrary, TrimStep,
};
use caduceus_cache::{Cache, MemoryStore};
use caduceus_core::{
    CacheError, EvidencePriority, FetchError, GenerationError, Generator, HistoryTurn,
    KnowledgeSource, KvStore, PromptBudget, SourceHit,
};
use caduceus_sources::CachedSource;

// ── Mock Collaborators ───────────────────────────────────────────────────

/// A generator that records prompts and answers with a fixed reply.
struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        _max_tokens: usize,
        _stop: &[String],
    ) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// A knowledge source with a fixed answer that counts its fetches.
struct CountingSource {
    name: &'static str,
    text: String,
    url: Option<String>,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
            url: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.into());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for CountingSource {
    fn name(&self) -> &str {
        self.name
    }

    fn label(&self) -> &str {
        self.name
    }

    async fn fetch(&self, _query: &str) -> Result<SourceHit, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SourceHit::with_text(self.text.clone(), self.url.clone()))
    }
}

/// A key/value store that fails every call.
struct FailingStore {
    calls: AtomicUsize,
}

#[async_trait]
impl KvStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

const WIKI_TEXT: &str = "Chest pain is pain or discomfort in the chest. \
    It may be a symptom of a heart attack. \
    Shortness of breath often accompanies cardiac causes. \
    Other causes include reflux and muscle strain.";

/// 10 turns, each side 50 repeated words.
fn heavy_history() -> Vec<HistoryTurn> {
    (0..10)
        .map(|i| {
            HistoryTurn::new(
                format!("turn {i} ") + &"symptom ".repeat(50),
                "reassurance ".repeat(50),
            )
        })
        .collect()
}

fn pipeline(
    generator: Arc<dyn Generator>,
    chain: Vec<Arc<dyn KnowledgeSource>>,
    dictionary: Option<Arc<dyn KnowledgeSource>>,
    history_limit: usize,
    budget: PromptBudget,
) -> ChatPipeline {
    let mut aggregator = EvidenceAggregator::new(ReferenceLibrary::builtin(), chain);
    if let Some(dictionary) = dictionary {
        aggregator = aggregator.with_dictionary(dictionary);
    }
    ChatPipeline::new(
        aggregator,
        PromptComposer::clinical(history_limit),
        generator,
        Arc::new(EstimateCounter),
    )
    .with_settings(PipelineSettings {
        budget,
        ..PipelineSettings::default()
    })
}

/// Index of the last history drop must precede the first evidence drop.
fn history_dropped_before_evidence(steps: &[TrimStep]) -> bool {
    let last_history = steps
        .iter()
        .rposition(|s| matches!(s, TrimStep::DroppedHistoryTurn));
    let first_evidence = steps
        .iter()
        .position(|s| matches!(s, TrimStep::DroppedEvidence { .. }));
    match (last_history, first_evidence) {
        (Some(h), Some(e)) => h < e,
        _ => true,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn heavy_history_is_dropped_before_evidence() {
    let generator = Arc::new(RecordingGenerator::new("**Clinical Summary**: obtain an ECG."));
    let wiki = Arc::new(
        CountingSource::new("wikipedia", WIKI_TEXT).with_url("https://en.wikipedia.org/wiki/Chest_pain"),
    );
    let dictionary = Arc::new(CountingSource::new("dictionary", "A bodily sensation. Second sense."));
    let pipeline = pipeline(
        generator.clone(),
        vec![wiki.clone() as Arc<dyn KnowledgeSource>],
        Some(dictionary as Arc<dyn KnowledgeSource>),
        10,
        PromptBudget::new(1224, 400),
    );

    let prepared = pipeline
        .prepare("chest pain and shortness of breath", &heavy_history())
        .await;
    let fitted = &prepared.fitted;

    assert_eq!(fitted.budget, 824);
    assert!(fitted.within_budget);
    assert!(fitted.tokens <= 824, "tokens = {}", fitted.tokens);
    assert!(!fitted.was_truncated());

    // History had to go, and went first.
    assert!(fitted.steps.contains(&TrimStep::DroppedHistoryTurn));
    assert!(history_dropped_before_evidence(&fitted.steps));
    assert!(fitted.parts.history.len() < 10);

    // Evidence survives while history remains.
    if !fitted.parts.history.is_empty() {
        assert_eq!(fitted.parts.evidence, prepared.evidence);
    }
    assert!(fitted.parts.evidence.iter().any(|item| item.is_pinned()));

    // The newest turns are the ones kept.
    if let Some(last) = fitted.parts.history.last() {
        assert!(last.user.starts_with("turn 9 "));
    }

    let reply = pipeline
        .respond("chest pain and shortness of breath", &heavy_history())
        .await
        .unwrap();
    assert_eq!(reply, "**Clinical Summary**: obtain an ECG.");
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Background Knowledge]"));
    assert!(prompts[0].contains("[Sources]"));
    assert!(prompts[0].ends_with("AI: Let's analyze and reason step by step."));
}

#[tokio::test]
async fn tight_budget_keeps_pinned_guidance_longest() {
    let wiki = Arc::new(CountingSource::new("wikipedia", WIKI_TEXT));
    let dictionary = Arc::new(CountingSource::new("dictionary", "A bodily sensation."));
    let pipeline = pipeline(
        Arc::new(RecordingGenerator::new("ok")),
        vec![wiki as Arc<dyn KnowledgeSource>],
        Some(dictionary as Arc<dyn KnowledgeSource>),
        10,
        PromptBudget::new(1000, 400),
    );

    let prepared = pipeline
        .prepare("chest pain and shortness of breath", &heavy_history())
        .await;
    let fitted = &prepared.fitted;

    assert!(fitted.tokens <= 600);
    assert!(history_dropped_before_evidence(&fitted.steps));

    let dropped: Vec<EvidencePriority> = fitted
        .steps
        .iter()
        .filter_map(|s| match s {
            TrimStep::DroppedEvidence { priority, .. } => Some(*priority),
            _ => None,
        })
        .collect();
    // Lowest value goes first, pinned never while anything else remains.
    assert!(dropped.windows(2).all(|w| w[0] <= w[1]));
    if fitted.parts.evidence.len() == 1 {
        assert!(fitted.parts.evidence[0].is_pinned());
    }
}

#[tokio::test]
async fn empty_input_gives_only_pinned_guidance() {
    let wiki = Arc::new(CountingSource::new("wikipedia", WIKI_TEXT));
    let dictionary = Arc::new(CountingSource::new("dictionary", "A bodily sensation."));
    let pipeline = pipeline(
        Arc::new(RecordingGenerator::new("Could you describe the problem?")),
        vec![wiki.clone() as Arc<dyn KnowledgeSource>],
        Some(dictionary.clone() as Arc<dyn KnowledgeSource>),
        3,
        PromptBudget::default(),
    );

    for input in ["", "   \t\n "] {
        let prepared = pipeline.prepare(input, &[]).await;

        assert!(!prepared.evidence.is_empty());
        assert!(prepared.evidence.iter().all(|item| item.is_pinned()));
        assert!(prepared.fitted.within_budget);
        assert!(prepared.fitted.tokens <= 624);
        assert!(prepared.fitted.prompt.contains("User: \n"));
    }

    assert_eq!(wiki.calls(), 0);
    assert_eq!(dictionary.calls(), 0);
}

#[tokio::test]
async fn failing_cache_refetches_every_time() {
    let store = Arc::new(FailingStore {
        calls: AtomicUsize::new(0),
    });
    let cache = Cache::new(store.clone());
    let wiki = Arc::new(CountingSource::new("wikipedia", WIKI_TEXT));
    let cached: Arc<dyn KnowledgeSource> = Arc::new(CachedSource::new(wiki.clone(), cache));
    let pipeline = pipeline(
        Arc::new(RecordingGenerator::new("ok")),
        vec![cached],
        None,
        3,
        PromptBudget::default(),
    );

    for round in 1..=3 {
        let prepared = pipeline.prepare("chest pain", &[]).await;
        assert!(prepared.evidence.iter().any(|item| item.description() == "wikipedia"));
        assert_eq!(wiki.calls(), round);
    }
    assert!(store.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn working_cache_fetches_once() {
    let cache = Cache::new(Arc::new(MemoryStore::default()));
    let wiki = Arc::new(CountingSource::new("wikipedia", WIKI_TEXT));
    let cached: Arc<dyn KnowledgeSource> = Arc::new(CachedSource::new(wiki.clone(), cache));
    let pipeline = pipeline(
        Arc::new(RecordingGenerator::new("ok")),
        vec![cached],
        None,
        3,
        PromptBudget::default(),
    );

    let first = pipeline.prepare("chest pain", &[]).await;
    let second = pipeline.prepare("chest pain", &[]).await;

    assert_eq!(wiki.calls(), 1);
    assert_eq!(first.evidence, second.evidence);
}
