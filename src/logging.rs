//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "ASSETPIPE_LOG";

/// The filter used when `ASSETPIPE_LOG` is unset or invalid.
pub fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "assetpipe=debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Install the stderr subscriber. Calling this twice is harmless.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(true, false), "assetpipe=debug");
        assert_eq!(default_filter(false, true), "error");
        assert_eq!(default_filter(false, false), "info");
    }

    #[test]
    fn test_init_twice() {
        init(false, false);
        init(true, false);
    }
}
