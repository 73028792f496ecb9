//! Tracing subscriber setup for the CLI.
//!
//! Log events go to stderr so stdout carries only the `==>` banners and the
//! build report.

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

pub fn level_for(debug: bool) -> Level {
    if debug { Level::DEBUG } else { Level::INFO }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber was already set.
pub fn init(debug: bool) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level_for(debug))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}
