//! Diagnostic logging setup.
//!
//! The chat UI owns the terminal, so tracing output only ever goes to a
//! file. Without `--log-file` no subscriber is installed and the `tracing`
//! macros compile down to cheap no-ops.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILTER_ENV: &str = "SIDECHAT_LOG";
pub const DEFAULT_LOG_FILTER: &str = "sidechat=info";

/// Filter from `SIDECHAT_LOG`, falling back to the default directive when it
/// is unset or does not parse.
pub fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber, appending to `log_file` when given.
pub fn init_tracing(log_file: Option<&Path>) -> io::Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let directives = std::env::var(LOG_FILTER_ENV).ok();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(build_filter(directives.as_deref()))
        .with(file_layer)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_used_when_unset_or_invalid() {
        assert_eq!(build_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(build_filter(Some("  ")).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(build_filter(Some("sidechat=loud")).to_string(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn explicit_directives_are_kept() {
        assert_eq!(build_filter(Some("sidechat=debug")).to_string(), "sidechat=debug");
    }

    #[test]
    fn missing_log_file_is_a_no_op() {
        assert!(init_tracing(None).is_ok());
    }

    #[test]
    fn unwritable_log_path_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("sidechat.log");
        assert!(init_tracing(Some(&path)).is_err());
    }
}
