//! Shared test collaborators for pipeline tests.

use async_trait::async_trait;
use caduceus_core::{FetchError, GenerationError, Generator, KnowledgeSource, SourceHit};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A generator that replays scripted replies and records every call.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<(String, usize, Vec<String>)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// `(prompt, max_tokens, stop)` per call.
    pub fn calls(&self) -> Vec<(String, usize, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[String],
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_tokens, stop.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedGenerator: no more replies")
    }
}

/// A source that always returns the same text and counts its calls.
pub struct CountingSource {
    name: &'static str,
    text: &'static str,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(name: &'static str, text: &'static str) -> Self {
        Self {
            name,
            text,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
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
        Ok(SourceHit::with_text(self.text, None))
    }
}
