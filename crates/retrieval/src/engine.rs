//! Retrieval engine: warm-up controller and retriever.
//!
//! One engine exists per process. A single background task runs the
//! warm-up pipeline (load corpus, then load or build the vector
//! index) while request tasks poll readiness and retrieve. The
//! corpus, the index, and the readiness flag live behind one mutex;
//! the guard is held only for the instant of a check or publish,
//! never across an embedding call or disk I/O.

use crate::config::RetrievalConfig;
use crate::corpus::{self, Corpus, CorpusFingerprint, TextExtractor};
use crate::embeddings::EmbeddingProvider;
use crate::index::FlatIndex;
use medrag_core::AppResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Placeholder returned while the knowledge base is not yet queryable.
pub const STILL_INITIALIZING: &str =
    "I apologize, but I'm still initializing my knowledge base. Please try again in a moment.";

/// Placeholder returned when a query transiently fails.
pub const RETRIEVAL_TROUBLE: &str =
    "I apologize, but I'm having trouble accessing my knowledge base. Please try again later.";

/// Warm-up state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Warm-up has not finished (or failed fatally and never will)
    Loading,

    /// Warm-up finished but produced no index; queries degrade to the
    /// initializing placeholder indefinitely
    ReadyEmpty,

    /// Warm-up finished with a queryable index
    Ready,
}

/// State shared between the warm-up task and request tasks.
///
/// Written exactly once by the warm-up pipeline, read by every
/// request. The index assignment and the readiness flag are one
/// atomic publish step: both happen under the guard, index first, so
/// no reader can observe `ready` with a stale index.
#[derive(Debug, Default)]
struct SharedState {
    corpus: Option<Arc<Corpus>>,
    index: Option<Arc<FlatIndex>>,
    ready: bool,
}

/// The retrieval engine.
///
/// Owns the corpus, the vector index, and the readiness flag, plus
/// the injected embedding provider and text extractor. Constructed by
/// the process startup sequence, which must then invoke
/// [`RetrievalEngine::warm_up`] (or [`RetrievalEngine::spawn_warm_up`])
/// exactly once.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    provider: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    state: Mutex<SharedState>,
    warmup_started: AtomicBool,
}

impl RetrievalEngine {
    /// Create an engine over the given configuration and collaborators.
    pub fn new(
        config: RetrievalConfig,
        provider: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            config,
            provider,
            extractor,
            state: Mutex::new(SharedState::default()),
            warmup_started: AtomicBool::new(false),
        }
    }

    /// Whether warm-up has concluded (successfully or degraded).
    ///
    /// This signals "stop blocking, start answering", not "the index
    /// is non-empty"; see [`RetrievalEngine::status`] for the
    /// distinction.
    pub fn ready(&self) -> bool {
        self.lock_state().ready
    }

    /// Tri-state view of the warm-up outcome.
    pub fn status(&self) -> EngineStatus {
        let state = self.lock_state();
        if !state.ready {
            EngineStatus::Loading
        } else if state.index.is_none() {
            EngineStatus::ReadyEmpty
        } else {
            EngineStatus::Ready
        }
    }

    /// Run the one-shot warm-up pipeline.
    ///
    /// Any unexpected error is caught here, logged, and leaves the
    /// readiness flag unset: the engine stays in "loading" forever and
    /// every request is told to retry later. Fail-closed: better to
    /// never answer than to answer from a corpus that failed to load.
    ///
    /// A second invocation is a logged no-op.
    pub async fn warm_up(&self) {
        if self.warmup_started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Warm-up already started; ignoring repeated invocation");
            return;
        }

        tracing::info!("Starting retrieval engine warm-up");
        match self.run_pipeline().await {
            Ok(()) => tracing::info!("Warm-up complete; engine is ready"),
            Err(e) => tracing::error!("Fatal warm-up error, engine stays in loading state: {}", e),
        }
    }

    /// Spawn the warm-up pipeline as a background task so request
    /// handling can proceed concurrently.
    pub fn spawn_warm_up(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.warm_up().await })
    }

    /// Retrieve up to `k` documents relevant to `query`, nearest
    /// first.
    ///
    /// Never a hard error: before readiness (or after a degraded
    /// warm-up) this returns the initializing placeholder, and a
    /// per-query embedding or search failure returns the trouble
    /// placeholder. Ordinals outside the corpus are silently dropped,
    /// so a desynced persisted index yields fewer results rather than
    /// wrong panics.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        let (corpus, index) = {
            let state = self.lock_state();
            match (&state.corpus, &state.index) {
                (Some(corpus), Some(index)) if state.ready => {
                    (Arc::clone(corpus), Arc::clone(index))
                }
                _ => return vec![STILL_INITIALIZING.to_string()],
            }
        };

        let query_embedding = match self.provider.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::error!("Failed to embed query: {}", e);
                return vec![RETRIEVAL_TROUBLE.to_string()];
            }
        };

        let hits = match index.search(&query_embedding, k) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Index search failed: {}", e);
                return vec![RETRIEVAL_TROUBLE.to_string()];
            }
        };

        hits.into_iter()
            .filter_map(|(_distance, ordinal)| corpus.get(ordinal).map(str::to_string))
            .collect()
    }

    /// Retrieve with the configured default `k`.
    pub async fn retrieve_default(&self, query: &str) -> Vec<String> {
        self.retrieve(query, self.config.top_k).await
    }

    /// The warm-up pipeline: load corpus, then load the persisted
    /// index when its fingerprint matches, otherwise embed and build,
    /// then publish readiness as the final act.
    async fn run_pipeline(&self) -> AppResult<()> {
        let corpus = Arc::new(corpus::load_corpus(&self.config, self.extractor.as_ref())?);
        let fingerprint = corpus.fingerprint();

        {
            let mut state = self.lock_state();
            state.corpus = Some(Arc::clone(&corpus));
        }

        let index_path = self.config.index_path();
        let index = if index_path.exists() {
            match FlatIndex::load(&index_path) {
                Ok((index, stored)) if stored == fingerprint => {
                    tracing::info!(
                        "Reusing persisted index ({} vectors, dimension {})",
                        index.len(),
                        index.dim()
                    );
                    Some(index)
                }
                Ok(_) => {
                    tracing::warn!(
                        "Persisted index at {:?} was built against a different corpus; rebuilding",
                        index_path
                    );
                    self.build_index(&corpus, &fingerprint).await?
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load persisted index at {:?}: {}; rebuilding",
                        index_path,
                        e
                    );
                    self.build_index(&corpus, &fingerprint).await?
                }
            }
        } else {
            tracing::info!("No persisted index at {:?}; building a new one", index_path);
            self.build_index(&corpus, &fingerprint).await?
        };

        // Publish: index first, then the flag, under one guard.
        let mut state = self.lock_state();
        state.index = index.map(Arc::new);
        state.ready = true;

        Ok(())
    }

    /// Embed every document and build a fresh index.
    ///
    /// Per-document embedding failures are logged and skipped; the
    /// index is built from whatever succeeded. Returns `None` when
    /// nothing succeeded; the engine then becomes ready-but-empty so
    /// callers stop blocking. Persisting the artifact is best-effort.
    async fn build_index(
        &self,
        corpus: &Corpus,
        fingerprint: &CorpusFingerprint,
    ) -> AppResult<Option<FlatIndex>> {
        let total = corpus.len();
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(total);
        let mut skipped = 0usize;

        for doc in corpus.iter() {
            match self.provider.embed(&doc.text).await {
                Ok(embedding) => embeddings.push(embedding),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping document {} (embedding failed): {}", doc.ordinal, e);
                }
            }
        }

        if embeddings.is_empty() {
            tracing::error!(
                "No documents were successfully embedded ({} attempted); \
                 the engine will be ready but empty",
                total
            );
            return Ok(None);
        }

        if skipped > 0 {
            tracing::warn!(
                "Embedded {} of {} documents; {} skipped",
                embeddings.len(),
                total,
                skipped
            );
        }

        // Dimension is a property of the model; infer it from the data
        let dim = embeddings[0].len();
        let mut index = FlatIndex::new(dim)?;
        index.insert_all(&embeddings)?;

        tracing::info!("Built index with {} vectors, dimension {}", index.len(), dim);

        let index_path = self.config.index_path();
        if let Err(e) = index.save(&index_path, fingerprint) {
            // Non-fatal: the in-memory index serves this process; the
            // next restart rebuilds from scratch.
            tracing::error!("Failed to persist index to {:?}: {}", index_path, e);
        }

        Ok(Some(index))
    }

    fn lock_state(&self) -> MutexGuard<'_, SharedState> {
        // A poisoned lock means a panic elsewhere; the state itself is
        // still consistent (single writer, atomic publish).
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PlainTextExtractor;
    use crate::embeddings::HashEmbedder;
    use medrag_core::{AppError, AppResult};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Counts embed calls, delegating to the hash embedder.
    #[derive(Debug)]
    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(32),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn provider_name(&self) -> &str {
            "counting"
        }

        fn model_name(&self) -> &str {
            "counting-v1"
        }

        async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }
    }

    /// Always fails.
    #[derive(Debug)]
    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn provider_name(&self) -> &str {
            "failing"
        }

        fn model_name(&self) -> &str {
            "failing-v1"
        }

        async fn embed(&self, _text: &str) -> AppResult<Vec<f32>> {
            Err(AppError::Embedding("service unavailable".to_string()))
        }
    }

    /// Succeeds until `fail` is flipped, then fails every call.
    #[derive(Debug)]
    struct FlakyEmbedder {
        inner: HashEmbedder,
        fail: AtomicBool,
    }

    impl FlakyEmbedder {
        fn new() -> Self {
            Self {
                inner: HashEmbedder::new(32),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        fn model_name(&self) -> &str {
            "flaky-v1"
        }

        async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Embedding("service unavailable".to_string()));
            }
            self.inner.embed(text).await
        }
    }

    fn write_sources(dir: &Path) -> RetrievalConfig {
        std::fs::write(
            dir.join("conditions.csv"),
            "disease,description,precaution\n\
             Diabetes,High blood sugar levels,Monitor diet\n\
             Influenza,Contagious viral infection,Rest and fluids\n\
             Asthma,Inflamed airways,Avoid triggers\n",
        )
        .unwrap();

        std::fs::write(
            dir.join("handbook.txt"),
            "Hydration supports recovery from most infections.\n\n\
             Antibiotics do not treat viral illnesses.\n",
        )
        .unwrap();

        let mut config = RetrievalConfig::new(dir);
        config.tabular_sources = vec!["conditions.csv".to_string()];
        config.text_sources = vec!["handbook.txt".to_string()];
        config
    }

    fn engine_with(config: RetrievalConfig, provider: Arc<dyn EmbeddingProvider>) -> RetrievalEngine {
        RetrievalEngine::new(config, provider, Arc::new(PlainTextExtractor))
    }

    #[tokio::test]
    async fn test_retrieve_before_warmup_returns_placeholder() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let engine = engine_with(config, Arc::new(HashEmbedder::new(32)));

        assert!(!engine.ready());
        assert_eq!(engine.status(), EngineStatus::Loading);

        let results = engine.retrieve("diabetes", 3).await;
        assert_eq!(results, vec![STILL_INITIALIZING.to_string()]);
    }

    #[tokio::test]
    async fn test_warmup_then_retrieve() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let index_path = config.index_path();
        let engine = engine_with(config, Arc::new(HashEmbedder::new(32)));

        engine.warm_up().await;

        assert!(engine.ready());
        assert_eq!(engine.status(), EngineStatus::Ready);
        assert!(index_path.exists());

        let results = engine.retrieve("high blood sugar", 3).await;
        assert!(!results.is_empty());
        assert!(results.len() <= 3);

        // Every result is real corpus text
        let state = engine.lock_state();
        let corpus = state.corpus.as_ref().unwrap();
        for result in &results {
            assert!(corpus.iter().any(|doc| doc.text == *result));
        }
    }

    #[tokio::test]
    async fn test_spawned_warmup_publishes_readiness() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let engine = Arc::new(engine_with(config, Arc::new(HashEmbedder::new(32))));

        let handle = Arc::clone(&engine).spawn_warm_up();
        handle.await.unwrap();

        assert_eq!(engine.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_persisted_index_skips_bulk_embedding() {
        let temp = TempDir::new().unwrap();

        {
            let config = write_sources(temp.path());
            let engine = engine_with(config, Arc::new(CountingEmbedder::new()));
            engine.warm_up().await;
            assert_eq!(engine.status(), EngineStatus::Ready);
        }

        // Fresh process with the same data dir: the artifact is reused
        let config = write_sources(temp.path());
        let provider = Arc::new(CountingEmbedder::new());
        let engine = engine_with(config, Arc::clone(&provider) as Arc<dyn EmbeddingProvider>);

        engine.warm_up().await;
        assert_eq!(engine.status(), EngineStatus::Ready);
        assert_eq!(provider.calls(), 0, "no document should be re-embedded");

        // Query embedding still goes through the provider
        let results = engine.retrieve("inflamed airways", 2).await;
        assert_eq!(provider.calls(), 1);
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_changed_corpus_invalidates_persisted_index() {
        let temp = TempDir::new().unwrap();

        {
            let config = write_sources(temp.path());
            let engine = engine_with(config, Arc::new(HashEmbedder::new(32)));
            engine.warm_up().await;
        }

        // Corpus changes between process restarts
        std::fs::write(
            temp.path().join("handbook.txt"),
            "Completely new handbook content.\n",
        )
        .unwrap();

        let mut config = RetrievalConfig::new(temp.path());
        config.tabular_sources = vec!["conditions.csv".to_string()];
        config.text_sources = vec!["handbook.txt".to_string()];

        let provider = Arc::new(CountingEmbedder::new());
        let engine = engine_with(config, Arc::clone(&provider) as Arc<dyn EmbeddingProvider>);
        engine.warm_up().await;

        assert_eq!(engine.status(), EngineStatus::Ready);
        // 3 CSV rows + 1 paragraph were re-embedded
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_total_embedding_failure_degrades_gracefully() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let engine = engine_with(config, Arc::new(FailingEmbedder));

        engine.warm_up().await;

        // Readiness is published so callers stop blocking, but there
        // is no index to answer from.
        assert!(engine.ready());
        assert_eq!(engine.status(), EngineStatus::ReadyEmpty);

        let results = engine.retrieve("diabetes", 3).await;
        assert_eq!(results, vec![STILL_INITIALIZING.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut config = write_sources(temp.path());
        config.tabular_sources.push("absent.csv".to_string());
        let engine = engine_with(config, Arc::new(HashEmbedder::new(32)));

        engine.warm_up().await;

        // Fail-closed: readiness never set
        assert!(!engine.ready());
        assert_eq!(engine.status(), EngineStatus::Loading);

        let results = engine.retrieve("diabetes", 3).await;
        assert_eq!(results, vec![STILL_INITIALIZING.to_string()]);
    }

    #[tokio::test]
    async fn test_warmup_is_one_shot() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let provider = Arc::new(CountingEmbedder::new());
        let engine = engine_with(config, Arc::clone(&provider) as Arc<dyn EmbeddingProvider>);

        engine.warm_up().await;
        let calls_after_first = provider.calls();

        engine.warm_up().await;
        assert_eq!(provider.calls(), calls_after_first);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_returns_placeholder() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let provider = Arc::new(FlakyEmbedder::new());
        let engine = engine_with(config, Arc::clone(&provider) as Arc<dyn EmbeddingProvider>);

        engine.warm_up().await;
        assert_eq!(engine.status(), EngineStatus::Ready);

        provider.fail.store(true, Ordering::SeqCst);
        let results = engine.retrieve("diabetes", 3).await;
        assert_eq!(results, vec![RETRIEVAL_TROUBLE.to_string()]);
    }

    #[tokio::test]
    async fn test_out_of_range_ordinals_are_dropped() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(temp.path());
        let provider = Arc::new(HashEmbedder::new(32));
        let engine = engine_with(config, Arc::clone(&provider) as Arc<dyn EmbeddingProvider>);

        // Simulate a desynced persisted index: 3 indexed vectors but
        // only 2 corpus documents.
        let texts = vec![
            "doc zero".to_string(),
            "doc one".to_string(),
            "doc two".to_string(),
        ];
        let mut vectors = Vec::new();
        for text in &texts {
            vectors.push(provider.embed(text).await.unwrap());
        }
        let mut index = FlatIndex::new(32).unwrap();
        index.insert_all(&vectors).unwrap();

        {
            let mut state = engine.lock_state();
            state.corpus = Some(Arc::new(Corpus::from_texts(texts[..2].to_vec())));
            state.index = Some(Arc::new(index));
            state.ready = true;
        }

        // All 3 ordinals come back from search; ordinal 2 is dropped
        let results = engine.retrieve("doc", 3).await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result == "doc zero" || result == "doc one");
        }
    }

    #[tokio::test]
    async fn test_retrieve_default_uses_configured_k() {
        let temp = TempDir::new().unwrap();
        let mut config = write_sources(temp.path());
        config.top_k = 2;
        let engine = engine_with(config, Arc::new(HashEmbedder::new(32)));

        engine.warm_up().await;

        let results = engine.retrieve_default("viral infection").await;
        assert!(results.len() <= 2);
    }
}
