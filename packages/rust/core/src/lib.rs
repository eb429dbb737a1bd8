//! Core pipeline orchestration and domain logic for the company enricher.
//!
//! This crate ties together record selection, field retrieval, structured
//! enrichment, merging and loading into one chunked run
//! ([`pipeline::EnrichmentPipeline`]).

pub mod chunker;
pub mod enricher;
pub mod loader;
pub mod merger;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod selector;
pub mod throttle;

pub use pipeline::{
    EnrichmentPipeline, PipelineConfig, ProgressReporter, RunSummary, SilentProgress,
};
pub use prompts::PromptStore;
