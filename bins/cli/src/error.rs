//! CLI error types and exit-code mapping.

use code_hub_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Internal = 1,
    InvalidInput = 2,
    Io = 3,
    Conflict = 4,
    NotFound = 5,
    Unauthorized = 6,
    Network = 7,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Exit code for a hub error envelope, keyed on its stable code.
#[must_use]
pub fn envelope_exit_code(error: &ErrorEnvelope) -> ExitCode {
    if error.code == ErrorCode::invalid_input() {
        ExitCode::InvalidInput
    } else if error.code == ErrorCode::conflict() {
        ExitCode::Conflict
    } else if error.code == ErrorCode::not_found() {
        ExitCode::NotFound
    } else if error.code == ErrorCode::unauthorized() {
        ExitCode::Unauthorized
    } else if error.code == ErrorCode::network() || error.code == ErrorCode::timeout() {
        ExitCode::Network
    } else if error.code == ErrorCode::io() {
        ExitCode::Io
    } else {
        ExitCode::Internal
    }
}

#[derive(Debug)]
pub enum CliError {
    InvalidInput(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl CliError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Io(_) => ExitCode::Io,
            Self::Serialization(_) => ExitCode::Internal,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(formatter, "invalid input: {message}"),
            Self::Io(error) => write!(formatter, "io error: {error}"),
            Self::Serialization(error) => write!(formatter, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}
