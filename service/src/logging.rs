use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TerminalMode};

/// Network stack crates that log every frame and socket event. Hidden unless
/// the level is TRACE.
const NOISY_DEPENDENCIES: &[&str] = &["hyper", "rustls", "eventsource_client", "mio", "tokio"];

pub struct Logger;

impl Logger {
    /// Install the global terminal logger.
    ///
    /// Development logs go to stdout/stderr by level with colors; staging and
    /// production write everything uncolored to stderr. Fails if a global
    /// logger is already installed.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let level = config.log_level_filter;
        let (mode, color) = Self::terminal_for(&config.runtime_env());

        simplelog::TermLogger::init(level, Self::build_log_config(level), mode, color)
    }

    fn terminal_for(env: &RustEnv) -> (TerminalMode, ColorChoice) {
        match env {
            RustEnv::Development => (TerminalMode::Mixed, ColorChoice::Auto),
            RustEnv::Staging | RustEnv::Production => (TerminalMode::Stderr, ColorChoice::Never),
        }
    }

    fn hides_dependencies(level: LevelFilter) -> bool {
        level < LevelFilter::Trace
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if Self::hides_dependencies(level) {
            for module in NOISY_DEPENDENCIES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
