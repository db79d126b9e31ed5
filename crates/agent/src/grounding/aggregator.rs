//! Evidence aggregation.
//!
//! Producers run in a fixed priority order:
//!
//! 1. the local [`ReferenceLibrary`] (pinned entries, then keyword matches)
//! 2. dictionary definitions for the input's key terms, merged into one item
//! 3. the external lookup chain, where the first source with a usable
//!    result wins
//!
//! A producer that errors, times out or returns blank text contributes
//! nothing. No producer failure reaches the caller.

use super::reference::ReferenceLibrary;
use super::relevance::{RelevanceSelector, trim_to_sentences};
use super::terms::TermExtractor;
use caduceus_config::ChainMode;
use caduceus_core::{EvidenceItem, EvidencePriority, KnowledgeSource, SourceHit};
use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Description of the merged dictionary item.
pub const DEFINITIONS_LABEL: &str = "Dictionary definitions";

/// Tuning knobs for [`EvidenceAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Cap on returned items. Pinned items are kept even beyond it.
    pub max_evidence: usize,
    /// Key terms looked up in the dictionary.
    pub max_definitions: usize,
    pub chain_mode: ChainMode,
    /// Upper bound on one source's fetch, however many requests it makes.
    pub fetch_timeout: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            max_evidence: 3,
            max_definitions: 3,
            chain_mode: ChainMode::Sequential,
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

/// Builds the ordered evidence list for one request.
pub struct EvidenceAggregator {
    reference: ReferenceLibrary,
    dictionary: Option<Arc<dyn KnowledgeSource>>,
    chain: Vec<Arc<dyn KnowledgeSource>>,
    extractor: TermExtractor,
    selector: RelevanceSelector,
    settings: AggregatorSettings,
}

impl EvidenceAggregator {
    pub fn new(reference: ReferenceLibrary, chain: Vec<Arc<dyn KnowledgeSource>>) -> Self {
        let extractor = TermExtractor::default();
        Self {
            reference,
            dictionary: None,
            chain,
            selector: RelevanceSelector::new(extractor.clone(), 2),
            extractor,
            settings: AggregatorSettings::default(),
        }
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn KnowledgeSource>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Replace the term extractor; the selector keeps its sentence cap.
    pub fn with_extractor(mut self, extractor: TermExtractor, max_sentences: usize) -> Self {
        self.selector = RelevanceSelector::new(extractor.clone(), max_sentences);
        self.extractor = extractor;
        self
    }

    pub fn with_settings(mut self, settings: AggregatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub fn extractor(&self) -> &TermExtractor {
        &self.extractor
    }

    /// Names of the chain sources, in priority order.
    pub fn chain_names(&self) -> Vec<&str> {
        self.chain.iter().map(|s| s.name()).collect()
    }

    /// Evidence for `input`, highest priority first, capped at
    /// `max_evidence` non-pinned slots.
    pub async fn build_grounding(&self, input: &str) -> Vec<EvidenceItem> {
        let input = input.trim();
        let mut items = self.reference.matching(input);

        if input.is_empty() {
            items.retain(EvidenceItem::is_pinned);
            return cap_evidence(items, self.settings.max_evidence);
        }

        if self.has_room(&items) {
            let terms = self.extractor.extract_terms(input);
            debug!(?terms, "Extracted key terms");
            if let Some(item) = self.definitions(&terms).await {
                items.push(item);
            }
        }

        if self.has_room(&items) {
            if let Some(item) = self.first_lookup(input).await {
                items.push(item);
            }
        }

        let items = cap_evidence(items, self.settings.max_evidence);
        info!(
            count = items.len(),
            sources = ?items.iter().map(|i| i.description()).collect::<Vec<_>>(),
            "Grounding assembled"
        );
        items
    }

    /// Whether a non-pinned item would survive [`cap_evidence`].
    fn has_room(&self, items: &[EvidenceItem]) -> bool {
        let pinned = items.iter().filter(|i| i.is_pinned()).count();
        items.len() - pinned < self.settings.max_evidence.saturating_sub(pinned)
    }

    // ── Producers ──────────────────────────────────────────────────────────

    async fn definitions(&self, terms: &[String]) -> Option<EvidenceItem> {
        let dictionary = self.dictionary.as_ref()?;
        let terms: Vec<&String> = terms.iter().take(self.settings.max_definitions).collect();
        if terms.is_empty() {
            return None;
        }

        let hits = join_all(terms.iter().map(|term| self.fetch_bounded(dictionary, term))).await;
        let lines: Vec<String> = terms
            .iter()
            .zip(hits)
            .filter_map(|(term, hit)| {
                let text = hit?.text().map(|t| trim_to_sentences(t, 1))?;
                (!text.is_empty()).then(|| format!("**{term}**: {text}"))
            })
            .collect();

        if lines.is_empty() {
            return None;
        }
        EvidenceItem::new(DEFINITIONS_LABEL, &lines.join("\n"), None, EvidencePriority::Definition)
    }

    async fn first_lookup(&self, query: &str) -> Option<EvidenceItem> {
        match self.settings.chain_mode {
            ChainMode::Sequential => {
                for source in &self.chain {
                    let hit = self.fetch_bounded(source, query).await;
                    if let Some(item) = hit.and_then(|hit| self.lookup_item(source, hit, query)) {
                        return Some(item);
                    }
                }
                None
            }
            ChainMode::Concurrent => self.first_lookup_concurrent(query).await,
        }
    }

    /// Fetch every chain source at once but accept results in chain order:
    /// an item wins only once every source ahead of it has settled empty.
    /// Outstanding fetches are dropped as soon as a winner is known.
    async fn first_lookup_concurrent(&self, query: &str) -> Option<EvidenceItem> {
        let mut pending: FuturesUnordered<_> = self
            .chain
            .iter()
            .enumerate()
            .map(|(index, source)| async move {
                let item = self
                    .fetch_bounded(source, query)
                    .await
                    .and_then(|hit| self.lookup_item(source, hit, query));
                (index, item)
            })
            .collect();

        // None = still running, Some(None) = settled empty.
        let mut slots: Vec<Option<Option<EvidenceItem>>> = vec![None; self.chain.len()];
        while let Some((index, item)) = pending.next().await {
            slots[index] = Some(item);
            for slot in slots.iter_mut() {
                match slot {
                    None => break,
                    Some(None) => continue,
                    Some(Some(_)) => return slot.take().flatten(),
                }
            }
        }
        None
    }

    fn lookup_item(
        &self,
        source: &Arc<dyn KnowledgeSource>,
        hit: SourceHit,
        query: &str,
    ) -> Option<EvidenceItem> {
        let selected = self.selector.select_relevant(hit.text()?, query);
        let content = match hit.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("{title}: {selected}"),
            _ => selected,
        };
        EvidenceItem::new(source.label(), &content, hit.url, EvidencePriority::Lookup)
    }

    /// One fetch under the per-source timeout. Errors, timeouts and blank
    /// results all become `None`.
    async fn fetch_bounded(&self, source: &Arc<dyn KnowledgeSource>, query: &str) -> Option<SourceHit> {
        match tokio::time::timeout(self.settings.fetch_timeout, source.fetch(query)).await {
            Ok(Ok(hit)) if !hit.is_empty() => Some(hit),
            Ok(Ok(_)) => {
                debug!(source = source.name(), query, "No result");
                None
            }
            Ok(Err(e)) => {
                warn!(source = source.name(), error = %e, "Evidence source failed");
                None
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    timeout_ms = self.settings.fetch_timeout.as_millis() as u64,
                    "Evidence source timed out"
                );
                None
            }
        }
    }
}

/// Keep every pinned item and fill the remaining `max` slots in order.
pub fn cap_evidence(items: Vec<EvidenceItem>, max: usize) -> Vec<EvidenceItem> {
    let pinned = items.iter().filter(|i| i.is_pinned()).count();
    let mut room = max.saturating_sub(pinned);
    items
        .into_iter()
        .filter(|item| {
            if item.is_pinned() {
                true
            } else if room > 0 {
                room -= 1;
                true
            } else {
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caduceus_core::FetchError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A source that replays one outcome after an optional delay and counts
    /// its calls.
    struct MockSource {
        name: String,
        outcome: Result<SourceHit, FetchError>,
        delay: Duration,
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    impl MockSource {
        fn new(name: &str, outcome: Result<SourceHit, FetchError>) -> Arc<Self> {
            Self::delayed(name, outcome, Duration::ZERO)
        }

        fn delayed(name: &str, outcome: Result<SourceHit, FetchError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                outcome,
                delay,
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KnowledgeSource for MockSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn label(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone()
        }
    }

    fn hit(text: &str) -> Result<SourceHit, FetchError> {
        Ok(SourceHit::with_text(text, Some(format!("https://example.org/{}", text.len()))))
    }

    fn failure(name: &str) -> Result<SourceHit, FetchError> {
        Err(FetchError::network(name, "connection refused"))
    }

    fn chain(sources: &[&Arc<MockSource>]) -> Vec<Arc<dyn KnowledgeSource>> {
        sources
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn KnowledgeSource>)
            .collect()
    }

    fn settings(mode: ChainMode) -> AggregatorSettings {
        AggregatorSettings {
            max_evidence: 3,
            max_definitions: 3,
            chain_mode: mode,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    fn descriptions(items: &[EvidenceItem]) -> Vec<&str> {
        items.iter().map(|i| i.description()).collect()
    }

    #[tokio::test]
    async fn priority_order_reference_definitions_lookup() {
        let dictionary = MockSource::new("dictionary", hit("A sensation of physical suffering. Also used loosely."));
        let wiki = MockSource::new("Wikipedia", hit("Chest pain is pain in the chest. It has many causes."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::builtin(), chain(&[&wiki]))
            .with_dictionary(dictionary.clone());

        let items = aggregator.build_grounding("chest pain and shortness of breath").await;
        assert_eq!(
            descriptions(&items),
            vec!["AHA/ACC/HFSA Guideline", DEFINITIONS_LABEL, "Wikipedia"]
        );
        assert_eq!(items[2].content(), "Chest pain is pain in the chest.");
        assert!(items[2].url().is_some());
    }

    #[tokio::test]
    async fn definitions_merge_into_one_item() {
        let dictionary = MockSource::new("dictionary", hit("First sentence. Second sentence."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), vec![])
            .with_dictionary(dictionary.clone());

        let items = aggregator.build_grounding("chest pain and shortness of breath").await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].content(),
            "**chest pain**: First sentence.\n**chest**: First sentence.\n**shortness**: First sentence."
        );
        assert_eq!(items[0].priority(), EvidencePriority::Definition);
        assert_eq!(items[0].url(), None);
        // capped at max_definitions
        assert_eq!(dictionary.calls(), 3);
    }

    #[tokio::test]
    async fn chain_short_circuits_on_first_hit() {
        let first = MockSource::new("first", Ok(SourceHit::empty()));
        let second = MockSource::new("second", hit("Asthma narrows the airways."));
        let third = MockSource::new("third", hit("Never consulted."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&first, &second, &third]))
            .with_settings(settings(ChainMode::Sequential));

        let items = aggregator.build_grounding("asthma attack").await;
        assert_eq!(descriptions(&items), vec!["second"]);
        assert_eq!((first.calls(), second.calls(), third.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let dictionary = MockSource::new("dictionary", failure("dictionary"));
        let broken = MockSource::new("broken", failure("broken"));
        let blank = MockSource::new("blank", hit("   \n  "));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::builtin(), chain(&[&broken, &blank]))
            .with_dictionary(dictionary.clone());

        let items = aggregator.build_grounding("persistent migraine").await;
        assert_eq!(descriptions(&items), vec!["AHA/ACC/HFSA Guideline"]);
        assert_eq!((broken.calls(), blank.calls()), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out_and_chain_continues() {
        let slow = MockSource::delayed("slow", hit("Too late."), Duration::from_secs(60));
        let fast = MockSource::new("fast", hit("Gout is inflammatory arthritis."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&slow, &fast]))
            .with_settings(settings(ChainMode::Sequential));

        let items = aggregator.build_grounding("gout flare").await;
        assert_eq!(descriptions(&items), vec!["fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_chain_keeps_priority_order() {
        // The lower-priority source answers first but must not win.
        let preferred = MockSource::delayed("preferred", hit("Preferred answer."), Duration::from_secs(3));
        let quick = MockSource::delayed("quick", hit("Quick answer."), Duration::from_millis(10));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&preferred, &quick]))
            .with_settings(settings(ChainMode::Concurrent));

        let items = aggregator.build_grounding("sepsis management").await;
        assert_eq!(descriptions(&items), vec!["preferred"]);
        assert_eq!((preferred.calls(), quick.calls()), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_chain_falls_through_failures() {
        let broken = MockSource::delayed("broken", failure("broken"), Duration::from_secs(2));
        let empty = MockSource::new("empty", Ok(SourceHit::empty()));
        let good = MockSource::delayed("good", hit("Good answer."), Duration::from_secs(1));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&broken, &empty, &good]))
            .with_settings(settings(ChainMode::Concurrent));

        let started = tokio::time::Instant::now();
        let items = aggregator.build_grounding("sepsis management").await;
        assert_eq!(descriptions(&items), vec!["good"]);
        // settles once the slowest higher-priority source fails
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_input_returns_only_pinned() {
        let dictionary = MockSource::new("dictionary", hit("Should not be asked."));
        let wiki = MockSource::new("Wikipedia", hit("Should not be asked."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::builtin(), chain(&[&wiki]))
            .with_dictionary(dictionary.clone());

        for input in ["", "   \t\n"] {
            let items = aggregator.build_grounding(input).await;
            assert_eq!(descriptions(&items), vec!["AHA/ACC/HFSA Guideline"]);
        }
        assert_eq!((dictionary.calls(), wiki.calls()), (0, 0));
    }

    #[tokio::test]
    async fn full_reference_matches_skip_network() {
        let wiki = MockSource::new("Wikipedia", hit("Unused."));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::builtin(), chain(&[&wiki]));

        let items = aggregator
            .build_grounding("HFrEF patient asking about dapagliflozin vs empagliflozin")
            .await;
        assert_eq!(
            descriptions(&items),
            vec!["AHA/ACC/HFSA Guideline", "DAPA-HF Trial", "EMPEROR-Reduced Trial"]
        );
        assert_eq!(wiki.calls(), 0);
    }

    #[tokio::test]
    async fn titled_hits_prefix_content() {
        let papers = MockSource::new(
            "Semantic Scholar",
            Ok(SourceHit::with_text("Beta blockers reduce mortality. Unrelated.", None).titled("MERIT-HF")),
        );
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&papers]));

        let items = aggregator.build_grounding("beta blockers after infarction").await;
        assert_eq!(items[0].content(), "MERIT-HF: Beta blockers reduce mortality.");
    }

    #[tokio::test]
    async fn chain_receives_trimmed_input() {
        let wiki = MockSource::new("Wikipedia", Ok(SourceHit::empty()));
        let aggregator = EvidenceAggregator::new(ReferenceLibrary::default(), chain(&[&wiki]));

        aggregator.build_grounding("  asthma  \n").await;
        assert_eq!(*wiki.queries.lock().unwrap(), vec!["asthma".to_string()]);
    }

    #[test]
    fn cap_keeps_all_pinned() {
        let item = |desc: &str, priority| EvidenceItem::new(desc, "content", None, priority).unwrap();
        let items = vec![
            item("p1", EvidencePriority::Pinned),
            item("p2", EvidencePriority::Pinned),
            item("r", EvidencePriority::Reference),
            item("d", EvidencePriority::Definition),
            item("l", EvidencePriority::Lookup),
        ];

        assert_eq!(descriptions(&cap_evidence(items.clone(), 3)), vec!["p1", "p2", "r"]);
        assert_eq!(descriptions(&cap_evidence(items.clone(), 1)), vec!["p1", "p2"]);
        assert_eq!(cap_evidence(items, 10).len(), 5);
    }
}
