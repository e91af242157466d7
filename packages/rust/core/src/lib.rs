//! Rebuild orchestration for the WikiScope project index.
//!
//! The single entry point is [`rebuild`], which drives the normalizer,
//! resolver, and extractor over the full category universe and replaces the
//! live index through the storage layer's staged-generation swap.

pub mod pipeline;

pub use pipeline::{ProgressReporter, RebuildOutcome, SilentProgress, rebuild};
