use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber: formatted events on stderr, filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed, in which case nothing changes.
pub fn init() -> bool {
    init_with_default(DEFAULT_FILTER)
}

/// Like [`init`], with `default_filter` used in place of [`DEFAULT_FILTER`].
pub fn init_with_default(default_filter: &str) -> bool {
    let subscriber = Registry::default();

    let fmt_filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_filter(fmt_filter_layer);

    subscriber.with(fmt_layer).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init_with_default("debug");
        assert!(!init());
        tracing::info!("logging initialized");
    }
}
