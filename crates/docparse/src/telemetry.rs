//! Tracing setup for binaries embedding the pipeline.
//!
//! Library code only emits spans and events; the host process decides how
//! they are rendered. `init_tracing` installs a sensible default: an fmt
//! subscriber filtered by `RUST_LOG` (falling back to `info`), with `log`
//! records from dependencies bridged into tracing.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
