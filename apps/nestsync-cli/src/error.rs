//! CLI error types and exit codes

use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the CLI (sysexits where one fits)
/// - 0: Every root completed or was skipped
/// - 1: At least one root failed
/// - 66: Root list could not be read
/// - 78: Configuration error
pub type CliResult<T> = Result<T, CliError>;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_INPUT: i32 = 66;
pub const EXIT_CONFIG: i32 = 78;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize {component}: {message}")]
    Setup { component: &'static str, message: String },

    #[error("Cannot read root list {location}: {message}")]
    RootList { location: String, message: String },

    #[error("No root list given. Pass --list or set SYNC_ROOT_LIST.")]
    NoRootList,

    #[error("{failed} of {total} root(s) failed")]
    RunFailed { failed: usize, total: usize },

    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Setup { .. } | CliError::NoRootList => EXIT_CONFIG,
            CliError::RootList { .. } => EXIT_NO_INPUT,
            CliError::RunFailed { .. } | CliError::Output(_) => EXIT_FAILURE,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
        if let Some(suggestion) = self.suggestion() {
            eprintln!("\nSuggestion: {suggestion}");
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some("Check the environment variables or the .env file."),
            CliError::RunFailed { .. } => {
                Some("See the log output above; a re-run converges once the cause is fixed.")
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(format!("JSON error: {e}"))
    }
}
