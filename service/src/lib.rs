//! Process-level plumbing shared by the host binary: configuration loading
//! and logger installation.

pub mod config;
pub mod logging;

pub use config::{Config, RustEnv};
pub use logging::Logger;
