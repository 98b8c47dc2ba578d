//! Detached ingestion jobs.

use super::{IngestError, IngestionReport, IngestionState, Result};
use crate::catalog::{DocumentCatalog, IngestionFlag};
use crate::config::Config;
use crate::extraction::is_placeholder;
use crate::rag::chunker::{chunk_text, drop_noise};
use crate::rag::{
    ChunkMetadata, ChunkRecord, Document, DocumentId, Embedder, EmbedderError, EmbeddingWriter,
    RagEngine, WriteReport,
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Upper bound on a single rate-limit backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Settings {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_chars: usize,
    min_content_chars: usize,
    concurrency: usize,
    max_retries: u32,
    retry_base_delay: Duration,
    status_retention: Duration,
}

impl Settings {
    fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.rag.chunk_size,
            chunk_overlap: config.rag.chunk_overlap,
            min_chunk_chars: config.rag.min_chunk_chars,
            min_content_chars: config.rag.min_content_chars,
            concurrency: config.ingestion.concurrency.max(1),
            max_retries: config.ingestion.max_retries,
            retry_base_delay: Duration::from_millis(config.ingestion.retry_base_delay_ms),
            status_retention: Duration::from_millis(config.ingestion.status_retention_ms),
        }
    }
}

/// `base * 2^attempt`, saturating and capped at [`MAX_RETRY_DELAY`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

struct TrackedJob {
    run: u64,
    state: watch::Receiver<IngestionState>,
    cancel: CancellationToken,
}

type JobMap = Arc<RwLock<HashMap<DocumentId, TrackedJob>>>;

/// Runs chunking, embedding and writing for documents in background tasks.
///
/// Each document's chunks are embedded in sub-batches of the writer's batch
/// size, at most `ingestion.concurrency` calls at a time. A sub-batch is
/// written as soon as it is embedded. Chunks that fail to embed, and
/// sub-batches the store rejects, are skipped and reported; they never stop
/// the rest of the document.
///
/// Finished runs stay visible to [`status`](Self::status) for
/// `ingestion.status_retention_ms`, then drop out of the tracker.
///
/// # Examples
///
/// ```no_run
/// use lessonrag_core::ingest::IngestionOrchestrator;
/// use lessonrag_core::provider::create_provider;
/// use lessonrag_core::rag::{Document, RagEngine};
/// use lessonrag_core::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load_or_default();
/// let provider = create_provider(&config)?;
/// let rag = RagEngine::from_config(&config, provider).await?;
/// let orchestrator = IngestionOrchestrator::new(&config, &rag);
///
/// let handle = orchestrator.submit(Document::new("الألوان", "درس عن الألوان ...")).await?;
/// let report = handle.wait().await?;
/// println!("{}: {} chunks written", report.state, report.written);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct IngestionOrchestrator {
    embedder: Embedder,
    writer: EmbeddingWriter,
    catalog: Option<Arc<dyn DocumentCatalog>>,
    settings: Settings,
    jobs: JobMap,
    runs: Arc<AtomicU64>,
}

/// A tracker slot claimed for a document before its run starts.
///
/// While a reservation is held, [`IngestionOrchestrator::cancel`] for the
/// same id waits for the run it leads to. Pass it to
/// [`start`](IngestionOrchestrator::start) or give it back with
/// [`release`](IngestionOrchestrator::release).
pub struct Reservation {
    document_id: DocumentId,
    run: u64,
    state: watch::Sender<IngestionState>,
    cancel: CancellationToken,
    /// Finished run this slot replaced, restored on release
    previous: Option<TrackedJob>,
}

impl Reservation {
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }
}

impl IngestionOrchestrator {
    pub fn new(config: &Config, rag: &RagEngine) -> Self {
        Self {
            embedder: rag.embedder().clone(),
            writer: rag.writer().clone(),
            catalog: None,
            settings: Settings::from_config(config),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Flags documents in `catalog` when their ingestion ends `Failed` or
    /// `Skipped`.
    pub fn with_catalog(mut self, catalog: Arc<dyn DocumentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Checks that a document carries enough real text to be worth embedding.
    pub fn validate(&self, document: &Document) -> Result<()> {
        let text = document.text.as_deref().unwrap_or_default();
        let length = text.trim().chars().count();

        if length < self.settings.min_content_chars {
            return Err(IngestError::ContentTooShort {
                length,
                minimum: self.settings.min_content_chars,
            });
        }
        if is_placeholder(text) {
            return Err(IngestError::PlaceholderContent);
        }

        Ok(())
    }

    /// Validates `document` and starts ingesting it in the background.
    ///
    /// Returns as soon as the job is spawned. Re-submitting a document whose
    /// previous run has finished replaces its tracker entry.
    ///
    /// # Errors
    ///
    /// - [`IngestError::ContentTooShort`] / [`IngestError::PlaceholderContent`]
    ///   when the text fails validation
    /// - [`IngestError::AlreadyRunning`] when a run for the same id is still
    ///   in progress
    pub async fn submit(&self, document: Document) -> Result<IngestionHandle> {
        self.validate(&document)?;
        let reservation = self.reserve(document.id).await?;
        Ok(self.spawn(reservation, document))
    }

    /// Claims the tracker slot for `document_id` in state `Received`.
    ///
    /// # Errors
    ///
    /// [`IngestError::AlreadyRunning`] when a run for the id has not finished.
    pub async fn reserve(&self, document_id: DocumentId) -> Result<Reservation> {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get(&document_id) {
            if !job.state.borrow().is_terminal() {
                return Err(IngestError::AlreadyRunning(document_id));
            }
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        let (state, receiver) = watch::channel(IngestionState::Received);
        let cancel = CancellationToken::new();
        let previous = jobs.insert(
            document_id,
            TrackedJob {
                run,
                state: receiver,
                cancel: cancel.clone(),
            },
        );

        Ok(Reservation {
            document_id,
            run,
            state,
            cancel,
            previous,
        })
    }

    /// Runs `document` under `reservation`.
    ///
    /// Text that fails validation is not embedded: the run ends `Skipped`
    /// straight away, with the refusal as its reason, and the document is
    /// flagged for review.
    pub async fn start(&self, reservation: Reservation, document: Document) -> IngestionHandle {
        match self.validate(&document) {
            Ok(()) => self.spawn(reservation, document),
            Err(refusal) => self.skip(reservation, refusal).await,
        }
    }

    /// Gives back a reservation that will not be started, restoring the
    /// finished run it replaced.
    pub async fn release(&self, reservation: Reservation) {
        let Reservation {
            document_id,
            run,
            previous,
            ..
        } = reservation;

        let mut jobs = self.jobs.write().await;
        if jobs.get(&document_id).is_some_and(|job| job.run == run) {
            match previous {
                Some(job) => jobs.insert(document_id, job),
                None => jobs.remove(&document_id),
            };
        }
        // Dropping the sender wakes any `cancel` waiting on this slot
    }

    fn spawn(&self, reservation: Reservation, document: Document) -> IngestionHandle {
        let Reservation {
            document_id,
            run,
            state,
            cancel,
            ..
        } = reservation;
        let receiver = state.subscribe();

        let job = IngestionJob {
            document,
            embedder: self.embedder.clone(),
            writer: self.writer.clone(),
            catalog: self.catalog.clone(),
            settings: self.settings.clone(),
            state,
            cancel: cancel.clone(),
        };
        let jobs = self.jobs.clone();
        let retention = self.settings.status_retention;
        let span = info_span!("ingest", document_id = %document_id);
        let task = tokio::spawn(
            async move {
                let report = job.run().await;
                evict_after(jobs, document_id, run, retention);
                report
            }
            .instrument(span),
        );

        info!(document_id = %document_id, "ingestion submitted");
        IngestionHandle {
            document_id,
            state: receiver,
            cancel,
            task,
        }
    }

    async fn skip(&self, reservation: Reservation, refusal: IngestError) -> IngestionHandle {
        let Reservation {
            document_id,
            run,
            state,
            cancel,
            ..
        } = reservation;

        warn!(document_id = %document_id, reason = %refusal, "ingestion skipped");
        if let Some(catalog) = &self.catalog {
            if let Err(e) = catalog.flag(&document_id, Some(IngestionFlag::NeedsReview)).await {
                warn!(document_id = %document_id, error = %e, "could not update document flag");
            }
        }

        let mut report = IngestionReport::new(document_id);
        report.state = IngestionState::Skipped;
        report.reason = Some(refusal.to_string());
        state.send_replace(IngestionState::Skipped);
        evict_after(self.jobs.clone(), document_id, run, self.settings.status_retention);

        IngestionHandle {
            document_id,
            state: state.subscribe(),
            cancel,
            task: tokio::spawn(std::future::ready(report)),
        }
    }

    /// Submits `document` and waits for the run to finish.
    pub async fn ingest(&self, document: Document) -> Result<IngestionReport> {
        self.submit(document).await?.wait().await
    }

    /// Last observed state of the most recent run for `document_id`.
    pub async fn status(&self, document_id: &DocumentId) -> Option<IngestionState> {
        self.jobs
            .read()
            .await
            .get(document_id)
            .map(|job| *job.state.borrow())
    }

    /// Number of runs that have not reached a terminal state.
    pub async fn active(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| !job.state.borrow().is_terminal())
            .count()
    }

    /// Stops the run for `document_id` at its next sub-batch boundary and
    /// waits until it has stopped.
    ///
    /// Embedding calls already in flight finish and their results are
    /// discarded. A reserved run that has not started yet is cancelled
    /// before it writes anything. Returns the run's terminal state, or
    /// `None` when the tracker has no run for the id.
    pub async fn cancel(&self, document_id: &DocumentId) -> Option<IngestionState> {
        let mut state = {
            let jobs = self.jobs.read().await;
            let job = jobs.get(document_id)?;
            job.cancel.cancel();
            job.state.clone()
        };

        let terminal = state.wait_for(|s| s.is_terminal()).await.map(|s| *s).ok();
        Some(terminal.unwrap_or_else(|| *state.borrow()))
    }

    /// Drops the tracker entry of a finished run.
    pub async fn forget(&self, document_id: &DocumentId) {
        let mut jobs = self.jobs.write().await;
        if jobs
            .get(document_id)
            .is_some_and(|job| job.state.borrow().is_terminal())
        {
            jobs.remove(document_id);
        }
    }
}

/// Removes the tracker entry of run `run` once `retention` has passed,
/// unless a newer run for the same document replaced it.
fn evict_after(jobs: JobMap, document_id: DocumentId, run: u64, retention: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        let mut jobs = jobs.write().await;
        if jobs.get(&document_id).is_some_and(|job| job.run == run) {
            jobs.remove(&document_id);
            debug!(document_id = %document_id, "finished run evicted from tracker");
        }
    });
}

/// A running (or finished) ingestion job.
pub struct IngestionHandle {
    document_id: DocumentId,
    state: watch::Receiver<IngestionState>,
    cancel: CancellationToken,
    task: JoinHandle<IngestionReport>,
}

impl IngestionHandle {
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn state(&self) -> IngestionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<IngestionState> {
        self.state.clone()
    }

    /// Requests cancellation; the job stops at its next sub-batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<IngestionReport> {
        let document_id = self.document_id;
        self.task
            .await
            .map_err(|_| IngestError::TaskAborted(document_id))
    }
}

struct IngestionJob {
    document: Document,
    embedder: Embedder,
    writer: EmbeddingWriter,
    catalog: Option<Arc<dyn DocumentCatalog>>,
    settings: Settings,
    state: watch::Sender<IngestionState>,
    cancel: CancellationToken,
}

impl IngestionJob {
    async fn run(self) -> IngestionReport {
        let mut report = IngestionReport::new(self.document.id);
        if self.cancel.is_cancelled() {
            return self.finish(report, IngestionState::Cancelled).await;
        }
        let text = self.document.text.as_deref().unwrap_or_default();

        self.transition(&mut report, IngestionState::Chunking);
        let windows = chunk_text(text, self.settings.chunk_size, self.settings.chunk_overlap);
        let window_count = windows.len();
        let chunks = drop_noise(windows, self.settings.min_chunk_chars);
        report.total_chunks = chunks.len();
        report.dropped_noise = window_count - chunks.len();
        debug!(windows = window_count, kept = chunks.len(), "document chunked");

        if chunks.is_empty() {
            report.reason = Some("no usable content".to_string());
            return self.finish(report, IngestionState::Failed).await;
        }

        self.transition(&mut report, IngestionState::EmbeddingInFlight);
        let batches: Vec<Vec<(usize, String)>> = chunks
            .chunks(self.writer.batch_size())
            .map(<[_]>::to_vec)
            .collect();
        let batch_count = batches.len();

        let mut writes = WriteReport::default();
        let mut cancelled = false;
        for (n, batch) in batches.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let (records, failed) = self.embed_batch(batch).await;
            report.failed_indices.extend(failed);

            if self.cancel.is_cancelled() {
                debug!(discarded = records.len(), "discarding embeddings of cancelled run");
                cancelled = true;
                break;
            }

            // At most one sub-batch, so the writer never sleeps here
            if !records.is_empty() {
                writes.merge(self.writer.write(records).await);
            }

            let delay = self.writer.batch_delay();
            if n + 1 < batch_count && !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        report.written = writes.written_count;
        report.failed_indices.extend(writes.failed_indices);

        let state = if cancelled {
            IngestionState::Cancelled
        } else if report.written == 0 {
            report.reason = Some("no chunk could be embedded and written".to_string());
            IngestionState::Failed
        } else if report.failed_indices.is_empty() {
            IngestionState::Persisted
        } else {
            IngestionState::PartiallyPersisted
        };
        self.finish(report, state).await
    }

    /// Embeds one sub-batch with bounded concurrency, keeping chunk order.
    async fn embed_batch(&self, batch: Vec<(usize, String)>) -> (Vec<ChunkRecord>, Vec<usize>) {
        let results: Vec<std::result::Result<ChunkRecord, usize>> = stream::iter(batch)
            .map(|(chunk_index, content)| async move {
                match self.embed_with_retry(&content).await {
                    Ok(embedding) => Ok(ChunkRecord {
                        document_id: self.document.id,
                        chunk_index,
                        metadata: ChunkMetadata::for_chunk(&self.document.metadata, chunk_index),
                        content,
                        embedding,
                    }),
                    Err(e) => {
                        warn!(chunk_index, error = %e, "embedding failed, skipping chunk");
                        Err(chunk_index)
                    }
                }
            })
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(chunk_index) => failed.push(chunk_index),
            }
        }
        (records, failed)
    }

    /// Retries only on rate limiting, backing off exponentially in between.
    async fn embed_with_retry(&self, content: &str) -> std::result::Result<Vec<f32>, EmbedderError> {
        let mut attempt = 0;
        loop {
            match self.embedder.embed(content).await {
                Err(e) if e.is_rate_limited() && attempt < self.settings.max_retries => {
                    let delay = backoff_delay(self.settings.retry_base_delay, attempt);
                    debug!(attempt, ?delay, "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn transition(&self, report: &mut IngestionReport, state: IngestionState) {
        report.state = state;
        self.state.send_replace(state);
    }

    async fn finish(&self, mut report: IngestionReport, state: IngestionState) -> IngestionReport {
        report.failed_indices.sort_unstable();
        report.failed_indices.dedup();

        if let Some(catalog) = &self.catalog {
            let flag = if state.is_usable() {
                Some(None)
            } else if state == IngestionState::Failed {
                Some(Some(IngestionFlag::NeedsReview))
            } else {
                None
            };
            if let Some(flag) = flag {
                if let Err(e) = catalog.flag(&report.document_id, flag).await {
                    warn!(error = %e, "could not update document flag");
                }
            }
        }

        match state {
            IngestionState::Persisted => {
                info!(written = report.written, "document persisted")
            }
            IngestionState::PartiallyPersisted => warn!(
                written = report.written,
                failed = report.failed_indices.len(),
                "document partially persisted"
            ),
            IngestionState::Failed => warn!(
                reason = report.reason.as_deref().unwrap_or_default(),
                failed = report.failed_indices.len(),
                "document ingestion failed"
            ),
            _ => info!(written = report.written, state = %state, "ingestion stopped"),
        }

        self.transition(&mut report, state);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError, Result as ProviderResult};
    use crate::rag::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rate limits the first `rate_limited` embed calls, then succeeds.
    struct ThrottledProvider {
        rate_limited: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ThrottledProvider {
        async fn chat<'a>(
            &'a self,
            _request: ChatRequest,
            _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> ProviderResult<()> {
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.rate_limited {
                return Err(ProviderError::RateLimited("slow down".into()));
            }
            Ok(vec![0.6, 0.8])
        }
    }

    fn orchestrator(rate_limited: usize, max_retries: u32) -> (IngestionOrchestrator, Arc<ThrottledProvider>) {
        orchestrator_with(rate_limited, max_retries, |_| {})
    }

    fn orchestrator_with(
        rate_limited: usize,
        max_retries: u32,
        configure: impl FnOnce(&mut Config),
    ) -> (IngestionOrchestrator, Arc<ThrottledProvider>) {
        let mut config = Config::default();
        config.embedding.dimension = 2;
        config.ingestion.batch_delay_ms = 0;
        config.ingestion.retry_base_delay_ms = 1;
        config.ingestion.max_retries = max_retries;
        configure(&mut config);
        let provider = Arc::new(ThrottledProvider {
            rate_limited,
            calls: AtomicUsize::new(0),
        });
        let rag = RagEngine::new(&config, provider.clone(), Arc::new(InMemoryVectorStore::new(2)));
        (IngestionOrchestrator::new(&config, &rag), provider)
    }

    #[tokio::test]
    async fn test_too_short_rejected_before_spawn() {
        let (orchestrator, _) = orchestrator(0, 0);
        let doc = Document::new("t", "  قصير  ");

        let result = orchestrator.submit(doc.clone()).await;
        assert!(matches!(
            result,
            Err(IngestError::ContentTooShort { length: 4, minimum: 10 })
        ));
        assert_eq!(orchestrator.status(&doc.id).await, None);
    }

    #[tokio::test]
    async fn test_placeholder_rejected() {
        let (orchestrator, _) = orchestrator(0, 0);
        let doc = Document::new("t", "[File: plan.pdf] - Text will be extracted on server");
        assert_eq!(
            orchestrator.submit(doc).await.err(),
            Some(IngestError::PlaceholderContent)
        );
    }

    #[tokio::test]
    async fn test_rate_limit_retried_with_backoff() {
        let (orchestrator, provider) = orchestrator(2, 2);
        let report = orchestrator
            .ingest(Document::new("t", "a".repeat(120)))
            .await
            .unwrap();

        assert_eq!(report.state, IngestionState::Persisted);
        assert_eq!(report.written, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let (orchestrator, provider) = orchestrator(usize::MAX, 1);
        let doc = Document::new("t", "a".repeat(120));
        let report = orchestrator.ingest(doc.clone()).await.unwrap();

        assert_eq!(report.state, IngestionState::Failed);
        assert_eq!(report.failed_indices, vec![0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.status(&doc.id).await, Some(IngestionState::Failed));
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 40), MAX_RETRY_DELAY);
        assert_eq!(backoff_delay(Duration::MAX, 31), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_start_skips_refused_text() {
        let (orchestrator, provider) = orchestrator(0, 0);
        let doc = Document::new("t", "[File: plan.pdf] - Text will be extracted on server");

        let reservation = orchestrator.reserve(doc.id).await.unwrap();
        let report = orchestrator.start(reservation, doc.clone()).await.wait().await.unwrap();

        assert_eq!(report.state, IngestionState::Skipped);
        assert_eq!(
            report.reason,
            Some(IngestError::PlaceholderContent.to_string())
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.status(&doc.id).await, Some(IngestionState::Skipped));
    }

    #[tokio::test]
    async fn test_reservation_blocks_second_run_until_released() {
        let (orchestrator, _) = orchestrator(0, 0);
        let id = DocumentId::new();

        let reservation = orchestrator.reserve(id).await.unwrap();
        assert_eq!(orchestrator.status(&id).await, Some(IngestionState::Received));
        assert!(matches!(
            orchestrator.reserve(id).await,
            Err(IngestError::AlreadyRunning(_))
        ));

        orchestrator.release(reservation).await;
        assert_eq!(orchestrator.status(&id).await, None);
        assert!(orchestrator.reserve(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_reservation_never_embeds() {
        let (orchestrator, provider) = orchestrator(0, 0);
        let doc = Document::new("t", "a".repeat(120));

        let reservation = orchestrator.reserve(doc.id).await.unwrap();
        let waiter = {
            let orchestrator = orchestrator.clone();
            let id = doc.id;
            tokio::spawn(async move { orchestrator.cancel(&id).await })
        };
        tokio::task::yield_now().await;

        let report = orchestrator.start(reservation, doc).await.wait().await.unwrap();
        assert_eq!(report.state, IngestionState::Cancelled);
        assert_eq!(waiter.await.unwrap(), Some(IngestionState::Cancelled));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finished_runs_are_evicted_after_retention() {
        let (orchestrator, _) = orchestrator_with(0, 0, |config| {
            config.ingestion.status_retention_ms = 20;
        });
        let doc = Document::new("t", "a".repeat(120));

        let report = orchestrator.ingest(doc.clone()).await.unwrap();
        assert_eq!(report.state, IngestionState::Persisted);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(orchestrator.status(&doc.id).await, None);
    }

    #[tokio::test]
    async fn test_all_noise_fails_with_reason() {
        let (orchestrator, _) = orchestrator(0, 0);
        let report = orchestrator
            .ingest(Document::new("t", "short but valid"))
            .await
            .unwrap();

        assert_eq!(report.state, IngestionState::Failed);
        assert_eq!(report.dropped_noise, 1);
        assert_eq!(report.reason.as_deref(), Some("no usable content"));
    }
}
