//! Shared harness for the RAGFlow end-to-end scenarios
//!
//! A [`Scenario`] wires the real ingestion and query workflows to in-memory
//! fakes and a [`ManualClock`], so retention can be expired on demand.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use ragflow_core::{ManualClock, RunRecord, TriggerId, WorkflowRuntime};
use ragflow_kb::test_utils::{
    CountingVectorStore, HashingEmbedder, RecordingAnswerGenerator, StaticChunker,
};
use ragflow_kb::{
    AnswerGenerator, DocumentChunker, EmbeddingGenerator, IngestionWorkflow, QueryWorkflow,
    INGEST_EVENT, QUERY_EVENT,
};

pub const DIMENSION: usize = 64;

pub struct Scenario {
    pub runtime: WorkflowRuntime,
    pub clock: Arc<ManualClock>,
    pub store: CountingVectorStore,
    pub embedder: Arc<HashingEmbedder>,
    pub generator: Arc<RecordingAnswerGenerator>,
}

impl Scenario {
    /// A scenario whose documents all chunk to `chunks`
    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_chunker(Arc::new(StaticChunker::new(chunks)))
    }

    pub fn with_chunker(chunker: Arc<dyn DocumentChunker>) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let runtime = WorkflowRuntime::in_memory(clock.clone());
        let store = CountingVectorStore::new(DIMENSION);
        let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
        let generator = Arc::new(RecordingAnswerGenerator::new("Grounded answer."));

        let scenario = Self {
            runtime,
            clock,
            store,
            embedder,
            generator,
        };
        scenario.register(chunker, scenario.embedder.clone(), scenario.generator.clone());
        scenario
    }

    fn register(
        &self,
        chunker: Arc<dyn DocumentChunker>,
        embedder: Arc<dyn EmbeddingGenerator>,
        generator: Arc<dyn AnswerGenerator>,
    ) {
        self.runtime.register(
            INGEST_EVENT,
            Arc::new(IngestionWorkflow::new(
                chunker,
                embedder.clone(),
                Arc::new(self.store.clone()),
            )),
        );
        self.runtime.register(
            QUERY_EVENT,
            Arc::new(QueryWorkflow::new(
                embedder,
                Arc::new(self.store.clone()),
                generator,
            )),
        );
    }

    /// Submit an event and wait for every run it started to stop making progress
    pub async fn submit(&self, event: &str, payload: Value) -> TriggerId {
        let trigger = self
            .runtime
            .submit(event, payload)
            .await
            .unwrap_or_else(|e| panic!("submit {} failed: {}", event, e));
        self.runtime.settle().await;
        trigger
    }

    pub async fn run(&self, trigger: &TriggerId) -> RunRecord {
        let mut runs = self
            .runtime
            .runs_for_trigger(trigger)
            .await
            .unwrap_or_else(|e| panic!("runs for {} failed: {}", trigger, e));
        assert_eq!(runs.len(), 1, "expected exactly one run for {}", trigger);
        runs.remove(0)
    }

    /// Submit a query and return the finished run's output
    pub async fn ask(&self, payload: Value) -> Value {
        let trigger = self.submit(QUERY_EVENT, payload).await;
        let run = self.run(&trigger).await;
        run.output
            .unwrap_or_else(|| panic!("query run {} has no output ({})", run.run_id, run.status))
    }

    /// Move the clock forward and fire whatever timers became due
    pub async fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        let fired = self
            .runtime
            .process_due_timers()
            .await
            .unwrap_or_else(|e| panic!("timer processing failed: {}", e));
        self.runtime.settle().await;
        fired
    }
}
