//! Unified, `miette`-based diagnostics for Storycase.
//!
//! Every failure the pipeline can produce is a [`StorycaseError`]. Each variant carries
//! the data needed to explain itself, a stable diagnostic code of the form
//! `storycase::<phase>::<kind>`, and a help line. The CLI renders errors through
//! [`print_error`], which hands them to `miette::Report`.
//!
//! Code that needs to branch on a failure should match on [`ErrorKind`] rather than on
//! message text.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorycaseError>;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP statuses that mean the credential itself was refused.
const CREDENTIAL_REJECTED: [u16; 2] = [401, 403];

// ============================================================================
// ERROR KIND - copyable classification
// ============================================================================

/// Type-safe classification of a [`StorycaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InputNotFound,
    InvalidFormat,
    MissingColumns,
    InvalidPath,
    ServiceUnavailable,
    MalformedResponse,
    MissingCredential,
    Config,
    Output,
}

impl ErrorKind {
    /// The pipeline phase this kind of error belongs to.
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::InputNotFound | Self::InvalidFormat | Self::MissingColumns => "reader",
            Self::InvalidPath | Self::Output => "writer",
            Self::ServiceUnavailable | Self::MalformedResponse => "generator",
            Self::MissingCredential | Self::Config => "config",
        }
    }

    /// Suffix used in diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::InputNotFound => "input_not_found",
            Self::InvalidFormat => "invalid_format",
            Self::MissingColumns => "missing_columns",
            Self::InvalidPath => "invalid_path",
            Self::ServiceUnavailable => "service_unavailable",
            Self::MalformedResponse => "malformed_response",
            Self::MissingCredential => "missing_credential",
            Self::Config => "config",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storycase::{}::{}", self.phase(), self.code_suffix())
    }
}

// ============================================================================
// STORYCASE ERROR
// ============================================================================

/// Unified error type for every Storycase failure mode.
#[derive(Debug, Error)]
pub enum StorycaseError {
    #[error("input file '{}' was not found", path.display())]
    InputNotFound { path: PathBuf },

    #[error("'{}' is not a readable spreadsheet: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("input sheet is missing required column(s): {}", missing.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("output path '{}' does not have a .xlsx extension", path.display())]
    InvalidPath { path: PathBuf },

    #[error("AI service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        status: Option<u16>,
        /// The service said the API key itself is invalid, whatever the status.
        credential_rejected: bool,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("{}", malformed_message(story_id.as_deref(), reason))]
    MalformedResponse {
        story_id: Option<String>,
        reason: String,
        raw: String,
    },

    #[error("credential '{name}' is not set")]
    MissingCredential { name: String },

    #[error("invalid configuration in '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("failed to write '{}': {message}", path.display())]
    Output { path: PathBuf, message: String },
}

fn malformed_message(story_id: Option<&str>, reason: &str) -> String {
    match story_id {
        Some(id) => format!("AI service reply for story '{id}' could not be parsed: {reason}"),
        None => format!("AI service reply could not be parsed: {reason}"),
    }
}

impl StorycaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound { .. } => ErrorKind::InputNotFound,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::MissingColumns { .. } => ErrorKind::MissingColumns,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::MissingCredential { .. } => ErrorKind::MissingCredential,
            Self::Config { .. } => ErrorKind::Config,
            Self::Output { .. } => ErrorKind::Output,
        }
    }

    /// Builds a `ServiceUnavailable` error without an underlying cause.
    pub fn service(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            status,
            credential_rejected: false,
            source: None,
        }
    }

    /// Builds a `ServiceUnavailable` error for a refused API key.
    pub fn rejected_credential(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            status,
            credential_rejected: true,
            source: None,
        }
    }

    /// Attaches the id of the story being processed to a malformed-reply error.
    /// Other variants are returned unchanged.
    pub fn with_story(self, id: &str) -> Self {
        match self {
            Self::MalformedResponse { reason, raw, .. } => Self::MalformedResponse {
                story_id: Some(id.to_string()),
                reason,
                raw,
            },
            other => other,
        }
    }

    /// True when the AI service refused the credential: HTTP 401/403, or a reply that
    /// flagged the key as invalid.
    pub fn is_credential_rejection(&self) -> bool {
        match self {
            Self::ServiceUnavailable {
                credential_rejected: true,
                ..
            } => true,
            Self::ServiceUnavailable { status: Some(code), .. } => CREDENTIAL_REJECTED.contains(code),
            _ => false,
        }
    }

    /// Whether a failure for one story may be skipped while the run continues.
    pub fn is_row_recoverable(&self) -> bool {
        match self.kind() {
            ErrorKind::MalformedResponse => true,
            ErrorKind::ServiceUnavailable => !self.is_credential_rejection(),
            _ => false,
        }
    }

    /// The raw service payload, for malformed replies.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    fn help_text(&self) -> Option<String> {
        let help = match self {
            Self::InputNotFound { .. } => "check the input path and the working directory".to_string(),
            Self::InvalidFormat { .. } => {
                "the input must be a spreadsheet workbook (.xlsx, .xls, .xlsb or .ods)".to_string()
            }
            Self::MissingColumns { found, .. } => {
                let found = if found.is_empty() {
                    "none".to_string()
                } else {
                    found.join(", ")
                };
                format!("the first row must contain 'User Story ID' and 'User Story' headers (found: {found})")
            }
            Self::InvalidPath { .. } => "choose an output name ending in .xlsx, e.g. Test_Cases.xlsx".to_string(),
            Self::ServiceUnavailable { .. } if self.is_credential_rejection() => {
                "the API key was rejected; check that it is valid for the configured model".to_string()
            }
            Self::ServiceUnavailable { .. } => {
                "check network access to the AI service, or rerun with --keep-going to skip failing stories"
                    .to_string()
            }
            Self::MalformedResponse { .. } => {
                "the model did not return test cases as JSON; rerun, or use --keep-going to skip the story"
                    .to_string()
            }
            Self::MissingCredential { name } => {
                format!("export {name}, or add `{name}=<key>` to the .env file")
            }
            Self::Config { .. } => return None,
            Self::Output { .. } => "check that the output directory exists and is writable".to_string(),
        };
        Some(help)
    }
}

impl Diagnostic for StorycaseError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help_text()
            .map(|help| Box::new(help) as Box<dyn fmt::Display + 'a>)
    }
}

// ============================================================================
// ERROR FORMATTING
// ============================================================================

/// Prints an error to stderr with full miette diagnostics.
pub fn print_error(error: StorycaseError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
