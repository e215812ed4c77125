// Diagnostic logging for the front-ends
//
// Library code logs through tracing macros. The binaries install one fmt subscriber on
// stderr so stdout only carries results.

use crate::config::Verbosity;
use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable with an EnvFilter directive that overrides the verbosity level
pub const LOG_ENV: &str = "SEACHEST_LOG";

/// Quiet runs report failure through the exit code only, so nothing is logged
pub fn level_for(verbosity: Verbosity) -> LevelFilter {
    match verbosity {
        Verbosity::Quiet => LevelFilter::OFF,
        Verbosity::Level(0) => LevelFilter::ERROR,
        Verbosity::Level(1) => LevelFilter::WARN,
        Verbosity::Level(2) => LevelFilter::INFO,
        Verbosity::Level(3) => LevelFilter::DEBUG,
        Verbosity::Level(_) => LevelFilter::TRACE,
    }
}

pub fn filter_for(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| directive_filter(verbosity))
}

fn directive_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::new(level_for(verbosity).to_string())
}

/// Install the global subscriber. A second call is ignored.
pub fn init(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(verbosity.level() >= 3)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_verbosity() {
        assert_eq!(level_for(Verbosity::Level(0)), LevelFilter::ERROR);
        assert_eq!(level_for(Verbosity::default()), LevelFilter::WARN);
        assert_eq!(level_for(Verbosity::Level(2)), LevelFilter::INFO);
        assert_eq!(level_for(Verbosity::Level(3)), LevelFilter::DEBUG);
        assert_eq!(level_for(Verbosity::Level(4)), LevelFilter::TRACE);
    }

    #[test]
    fn test_quiet_disables_logging() {
        assert_eq!(level_for(Verbosity::Quiet), LevelFilter::OFF);
        assert_eq!(directive_filter(Verbosity::Quiet).to_string(), "off");
    }

    #[test]
    fn test_default_filter_stops_at_warn() {
        assert_eq!(directive_filter(Verbosity::default()).to_string(), "warn");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Verbosity::Quiet);
        init(Verbosity::Level(4));
    }
}
