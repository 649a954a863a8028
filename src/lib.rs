//! Library exports for the cliptab ingest pipeline.
/// Run configuration.
pub mod config;
/// Whole-file audio decoding.
pub mod decode;
/// Bounded-concurrency batch loading.
pub mod loader;
/// Logging setup.
pub mod logging;
/// Metadata table loading.
pub mod metadata;
/// Pipeline context and operations.
pub mod pipeline;
/// Static clip plot rendering.
pub mod plot;
/// Record-to-file path resolution.
pub mod resolve;
/// Output table assembly.
pub mod table;
