use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between reading the config and attaching.
#[derive(Debug, Error)]
pub enum Error {
    /// A required external program is not on `PATH`.
    #[error("{program} is not installed or could not be found in $PATH")]
    DependencyMissing { program: &'static str },

    /// An explicitly requested config file could not be read or parsed.
    #[error("failed to load config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// A source pattern could not be expanded.
    #[error("invalid glob pattern {pattern:?}: {message}")]
    Glob { pattern: String, message: String },

    /// The selector could not be run or answered with something unexpected.
    #[error("selector: {0}")]
    Protocol(String),

    /// A step of session creation failed.
    #[error("tmux {step} failed: {message}")]
    Materialize { step: &'static str, message: String },

    /// Attaching or switching to a session failed.
    #[error("tmux {command} failed: {message}")]
    Activation {
        command: &'static str,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
