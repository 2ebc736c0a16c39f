//! Diagnostic logging to stderr.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map `-v`/`-q` counts to a level. Warnings show by default.
pub fn level_for(verbose: u8, quiet: u8) -> LevelFilter {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-3 => LevelFilter::OFF,
        -2 | -1 => LevelFilter::ERROR,
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. A set `RUST_LOG` wins over the flags.
pub fn init(verbose: u8, quiet: u8, silent: bool) {
    let level = if silent {
        LevelFilter::OFF
    } else {
        level_for(verbose, quiet)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(true);

    // A second init (tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_default_is_warn() {
        assert_eq!(level_for(0, 0), LevelFilter::WARN);
    }

    #[test]
    fn test_level_for_verbose() {
        assert_eq!(level_for(1, 0), LevelFilter::INFO);
        assert_eq!(level_for(2, 0), LevelFilter::DEBUG);
        assert_eq!(level_for(3, 0), LevelFilter::TRACE);
        assert_eq!(level_for(9, 0), LevelFilter::TRACE);
    }

    #[test]
    fn test_level_for_quiet() {
        assert_eq!(level_for(0, 1), LevelFilter::ERROR);
        assert_eq!(level_for(0, 2), LevelFilter::ERROR);
        assert_eq!(level_for(0, 3), LevelFilter::OFF);
        assert_eq!(level_for(1, 5), LevelFilter::OFF);
    }

    #[test]
    fn test_level_for_counts_cancel() {
        assert_eq!(level_for(2, 2), LevelFilter::WARN);
    }
}
