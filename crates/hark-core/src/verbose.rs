//! Verbose logging support.
//!
//! Use `set_verbose(true)` before `init_logging` to raise hark's own targets to
//! `debug`. `RUST_LOG` always wins when it is set.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static INIT: Once = Once::new();

/// Enable or disable verbose logging
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::SeqCst);
}

/// Check if verbose logging is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Default filter directives for the current verbosity.
pub fn default_directives() -> &'static str {
    if is_verbose() {
        "info,hark=debug,hark_core=debug,tower_http=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives()));

        // Another subscriber may already be installed (tests, embedding apps)
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_toggles_directives() {
        set_verbose(true);
        assert!(default_directives().contains("hark_core=debug"));
        set_verbose(false);
        assert_eq!(default_directives(), "info");
    }
}
