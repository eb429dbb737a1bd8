//! End-to-end enrichment run: select → (retrieve → enrich → merge → load) per chunk.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use enricher_providers::{GenerativeService, SearchService};
use enricher_shared::{AppConfig, EnricherError, EnrichmentConfig, RecordKey, Result, RunId};
use enricher_warehouse::WarehouseClient;

use crate::chunker::chunked;
use crate::enricher::StructuredEnricher;
use crate::loader::{LoadTarget, WarehouseLoader};
use crate::merger::merge;
use crate::prompts::PromptStore;
use crate::retriever::FieldRetriever;
use crate::selector::select_records;

/// Settings the driver needs, carved out of the application config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub enrichment: EnrichmentConfig,
    /// Location passed through when the destination dataset is created.
    pub location: Option<String>,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enrichment: config.enrichment.clone(),
            location: config.warehouse.location.clone(),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Records returned by the selector.
    pub selected: usize,
    pub chunks_completed: usize,
    pub rows_loaded: u64,
    /// Search calls issued to fill missing fields.
    pub retrieval_calls: usize,
    /// Follow-up requests for degenerate enrichment items.
    pub repair_requests: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a chunk starts processing (1-based).
    fn chunk_started(&self, current: usize, total: usize, records: usize);
    /// Called after a chunk has been appended to the destination table.
    fn chunk_loaded(&self, current: usize, total: usize, rows: u64);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn chunk_started(&self, _current: usize, _total: usize, _records: usize) {}
    fn chunk_loaded(&self, _current: usize, _total: usize, _rows: u64) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Sequential chunk driver over the warehouse and the two LLM services.
pub struct EnrichmentPipeline {
    config: PipelineConfig,
    warehouse: Arc<dyn WarehouseClient>,
    retriever: FieldRetriever,
    enricher: StructuredEnricher,
    loader: WarehouseLoader,
}

impl EnrichmentPipeline {
    pub fn new(
        config: PipelineConfig,
        warehouse: Arc<dyn WarehouseClient>,
        search: Arc<dyn SearchService>,
        generative: Arc<dyn GenerativeService>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        let interval = Duration::from_millis(config.enrichment.submission_interval_ms);
        let retriever = FieldRetriever::new(search, prompts.clone(), interval);
        let enricher = StructuredEnricher::new(generative, prompts);
        let loader = WarehouseLoader::new(
            warehouse.clone(),
            LoadTarget {
                dataset: config.enrichment.processed_dataset.clone(),
                table: config.enrichment.processed_table.clone(),
                location: config.location.clone(),
            },
        );

        Self {
            config,
            warehouse,
            retriever,
            enricher,
            loader,
        }
    }

    /// Run the pipeline once.
    ///
    /// `chunk_size` overrides the configured value. Each chunk is loaded
    /// before the next one starts, so a failed run resumes from the first
    /// unloaded chunk on the next invocation.
    #[instrument(skip_all, fields(
        source = %self.config.enrichment.unprocessed_table,
        destination = %self.config.enrichment.processed_table,
    ))]
    pub async fn run(
        &self,
        chunk_size: Option<usize>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let config = &self.config.enrichment;
        let size = chunk_size.unwrap_or(config.chunk_size);
        let size = NonZeroUsize::new(size)
            .ok_or_else(|| EnricherError::config("chunk size must be at least 1"))?;

        let mut summary = RunSummary {
            run_id: RunId::new(),
            selected: 0,
            chunks_completed: 0,
            rows_loaded: 0,
            retrieval_calls: 0,
            repair_requests: 0,
            elapsed: Duration::ZERO,
        };
        info!(run_id = %summary.run_id, chunk_size = size.get(), "starting enrichment run");

        // --- Selection ---
        progress.phase("Selecting records");
        let records = select_records(self.warehouse.as_ref(), config).await?;
        summary.selected = records.len();

        if records.is_empty() {
            info!("no records to process");
            summary.elapsed = start.elapsed();
            progress.done(&summary);
            return Ok(summary);
        }

        // --- Chunks ---
        let chunks = chunked(records, size);
        let total = chunks.len();

        for (index, chunk) in chunks.enumerate() {
            let current = index + 1;
            progress.chunk_started(current, total, chunk.len());
            info!(chunk = current, total, records = chunk.len(), "processing chunk");

            let order = chunk
                .iter()
                .map(|record| record.key(&config.id_column))
                .collect::<Result<Vec<RecordKey>>>()?;

            progress.phase("Retrieving missing fields");
            let retrieved = self.retriever.retrieve(chunk, &config.id_column).await?;
            summary.retrieval_calls += retrieved.calls();
            let chunk = retrieved.into_ordered(&order)?;

            progress.phase("Enriching companies");
            let outcome = self.enricher.enrich(&chunk, &config.id_column).await?;
            summary.repair_requests += outcome.repairs;

            let merged = merge(chunk, &outcome.companies, &config.id_column)?;

            progress.phase("Loading chunk");
            let rows = self.loader.load_chunk(&summary.run_id, &merged).await?;
            summary.rows_loaded += rows;
            summary.chunks_completed = current;
            progress.chunk_loaded(current, total, rows);
        }

        summary.elapsed = start.elapsed();
        progress.done(&summary);

        info!(
            run_id = %summary.run_id,
            selected = summary.selected,
            chunks = summary.chunks_completed,
            rows_loaded = summary.rows_loaded,
            retrieval_calls = summary.retrieval_calls,
            repair_requests = summary.repair_requests,
            elapsed_ms = summary.elapsed.as_millis(),
            "enrichment run complete"
        );

        Ok(summary)
    }
}
