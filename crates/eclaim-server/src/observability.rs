// Tracing setup. The level starts at `info` and is swapped for the configured
// one once the config is loaded; RUST_LOG always wins.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

const STARTUP_LEVEL: &str = "info";

pub fn init_tracing() {
    let (reload_layer, handle) = reload::Layer::new(filter_for(STARTUP_LEVEL));
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Apply the configured level unless RUST_LOG is set.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| *f = filter_for(level));
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(directive(level, std::env::var("RUST_LOG").ok()))
}

fn directive(level: &str, rust_log: Option<String>) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| level.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_configured_level() {
        assert_eq!(directive("warn", Some("eclaim_transport=debug".into())), "eclaim_transport=debug");
        assert_eq!(directive("warn", None), "warn");
        assert_eq!(directive("warn", Some("  ".into())), "warn");
    }

    #[test]
    fn level_change_before_init_is_ignored() {
        apply_logging_level("debug");
    }
}
