//! Domain primitives with validated constructors.

use code_hub_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `RepoAlias` is empty after trimming or violates the allowed pattern.
    InvalidRepoAlias {
        /// Trimmed alias that failed validation.
        input: String,
    },
    /// `UserAlias` is empty after trimming or violates the allowed pattern.
    InvalidUserAlias {
        /// Trimmed alias that failed validation.
        input: String,
    },
    /// `UserId` is empty after trimming.
    InvalidUserId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `BranchName` is empty after trimming or contains whitespace.
    InvalidBranchName {
        /// Trimmed branch name that failed validation.
        input: String,
    },
    /// `SourceUrl` is not a parseable URL with a supported scheme.
    InvalidSourceUrl {
        /// Trimmed URL that failed validation.
        input: String,
    },
    /// Derived alias is invalid (invariant violation in the generator).
    DerivedAliasInvalid {
        /// Candidate alias that failed validation.
        candidate: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidRepoAlias { .. } | Self::DerivedAliasInvalid { .. } => {
                ErrorCode::new("domain", "invalid_repo_alias")
            },
            Self::InvalidUserAlias { .. } => ErrorCode::new("domain", "invalid_user_alias"),
            Self::InvalidUserId { .. } => ErrorCode::new("domain", "invalid_user_id"),
            Self::InvalidBranchName { .. } => ErrorCode::new("domain", "invalid_branch_name"),
            Self::InvalidSourceUrl { .. } => ErrorCode::new("domain", "invalid_source_url"),
        }
    }

    const fn is_invariant(&self) -> bool {
        matches!(self, Self::DerivedAliasInvalid { .. })
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRepoAlias { .. } => {
                formatter.write_str("RepoAlias must match /^[a-z0-9][a-z0-9._-]*$/")
            },
            Self::InvalidUserAlias { .. } => {
                formatter.write_str("UserAlias must match /^[a-z0-9][a-z0-9._-]*$/")
            },
            Self::InvalidUserId { .. } => formatter.write_str("UserId must be non-empty"),
            Self::InvalidBranchName { .. } => {
                formatter.write_str("BranchName must be non-empty without whitespace")
            },
            Self::InvalidSourceUrl { .. } => {
                formatter.write_str("SourceUrl must be an http(s), git, ssh, or file URL")
            },
            Self::DerivedAliasInvalid { .. } => {
                formatter.write_str("Derived alias is invalid (this is a bug).")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let mut envelope = if error.is_invariant() {
            Self::invariant(error.error_code(), error.to_string())
        } else {
            Self::expected(error.error_code(), error.to_string())
        };

        match error {
            PrimitiveError::InvalidRepoAlias { input }
            | PrimitiveError::InvalidUserAlias { input }
            | PrimitiveError::InvalidBranchName { input }
            | PrimitiveError::InvalidSourceUrl { input } => {
                envelope = envelope.with_metadata("input", input);
            },
            PrimitiveError::InvalidUserId { input_length } => {
                envelope = envelope.with_metadata("input_length", input_length.to_string());
            },
            PrimitiveError::DerivedAliasInvalid { candidate } => {
                envelope = envelope.with_metadata("candidate", candidate);
            },
        }

        envelope
    }
}

fn trimmed_non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn is_valid_alias(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

/// Globally unique identifier for a golden repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoAlias(Box<str>);

impl RepoAlias {
    /// Parse a `RepoAlias` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidRepoAlias {
                input: raw.to_owned(),
            });
        };
        if !is_valid_alias(trimmed) {
            return Err(PrimitiveError::InvalidRepoAlias {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RepoAlias {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepoAlias {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier for an activated repository, unique within its user's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAlias(Box<str>);

impl UserAlias {
    /// Parse a `UserAlias` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidUserAlias {
                input: raw.to_owned(),
            });
        };
        if !is_valid_alias(trimmed) {
            return Err(PrimitiveError::InvalidUserAlias {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserAlias {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for UserAlias {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier for the owning user of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Box<str>);

impl UserId {
    /// Parse a `UserId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidUserId {
                input_length: raw.len(),
            });
        };
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A git branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(Box<str>);

impl BranchName {
    /// Parse a `BranchName` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidBranchName {
                input: raw.to_owned(),
            });
        };
        if trimmed.chars().any(char::is_whitespace) {
            return Err(PrimitiveError::InvalidBranchName {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

const SUPPORTED_SCHEMES: [&str; 5] = ["http", "https", "git", "ssh", "file"];

/// Validated source URL for a golden repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceUrl(Box<str>);

impl SourceUrl {
    /// Parse a `SourceUrl`, accepting http(s), git, ssh, and file schemes.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidSourceUrl {
                input: raw.to_owned(),
            });
        };
        let parsed = Url::parse(trimmed).map_err(|_| PrimitiveError::InvalidSourceUrl {
            input: trimmed.to_owned(),
        })?;
        if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
            return Err(PrimitiveError::InvalidSourceUrl {
                input: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort project name derived from the final path segment.
    ///
    /// `https://host/org/acme.git` yields `acme`; used to auto-derive
    /// catalog aliases when the administrator supplies none.
    #[must_use]
    pub fn project_name(&self) -> Box<str> {
        let trimmed = self.0.trim_end_matches('/');
        let segment = trimmed
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(trimmed)
            .trim_end_matches(".git");
        let lowered: String = segment
            .chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        let cleaned = lowered.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        if cleaned.is_empty() {
            "repo".into()
        } else {
            cleaned.to_owned().into_boxed_str()
        }
    }
}

impl AsRef<str> for SourceUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
