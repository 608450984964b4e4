//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter directive to install
///
/// `verbose` forces `debug`; otherwise a non-empty `RUST_LOG` value wins over
/// the configured level.
pub fn filter_directive(config: &LoggingConfig, verbose: bool, rust_log: Option<&str>) -> String {
    if verbose {
        return "debug".to_string();
    }
    match rust_log.map(str::trim) {
        Some(env) if !env.is_empty() => env.to_string(),
        _ => config.level.clone(),
    }
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(config, verbose, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
