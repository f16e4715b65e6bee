//! CLI error type.

use std::fmt;

use manifest_fetch::FetchError;

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is inconsistent with the arguments.
    Config(String),
    /// The library reported a failure.
    Fetch(FetchError),
    /// The run was interrupted with Ctrl-C.
    Interrupted,
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 2,
            CliError::Fetch(_) => 1,
            CliError::Interrupted => 130,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Config { .. } => CliError::Config(e.to_string()),
            other => CliError::Fetch(other),
        }
    }
}
