//! Logging setup for the cliptab binaries.
//!
//! Installs a global tracing subscriber writing to stdout with a formatted
//! timestamp and `RUST_LOG`-style filtering. Subsequent calls are no-ops.
//! Failures are returned so callers can degrade gracefully without
//! aborting startup.

use std::sync::OnceLock;

use time::{UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_subscriber::{EnvFilter, fmt};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing to write to stdout.
pub fn init() -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }
    let subscriber = fmt::Subscriber::builder()
        .with_timer(build_timer())
        .with_env_filter(build_env_filter())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INITIALIZED.set(());
    Ok(())
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
