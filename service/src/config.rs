use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default realtime endpoint used when `REALTIME_URL` is not set.
pub const DEFAULT_REALTIME_URL: &str = "http://localhost:4000/realtime";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The realtime (Server-Sent Events) endpoint to connect to
    #[arg(short = 'u', long, env, default_value = DEFAULT_REALTIME_URL)]
    realtime_url: String,

    /// Bearer token sent in the Authorization header when connecting
    #[arg(long, env)]
    auth_token: Option<String>,

    /// Seconds to wait for the transport to connect before treating the attempt as failed
    #[arg(long, env, default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_secs: u64,

    /// Delay in milliseconds before the first reconnect attempt
    #[arg(long, env, default_value_t = 1000)]
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound in milliseconds for the reconnect delay
    #[arg(long, env, default_value_t = 30_000)]
    pub reconnect_max_delay_ms: u64,

    /// Factor applied to the reconnect delay after each failed attempt
    #[arg(long, env, default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub reconnect_multiplier: u32,

    /// Seconds between periodic refreshes. Set to 0 to disable the interval trigger.
    #[arg(long, env, default_value_t = 60)]
    pub refresh_interval_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap_or(RustEnv::Development)),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn realtime_url(&self) -> &str {
        &self.realtime_url
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.clone()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    /// Never shorter than the initial delay.
    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms).max(self.reconnect_initial_delay())
    }

    /// `None` when the interval trigger is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
