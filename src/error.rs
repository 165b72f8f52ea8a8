use thiserror::Error;

use crate::llm::LlmError;

/// Coarse classification shared by every failure the pipeline can surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required API key, token or database id is not configured
    CredentialMissing,
    /// The session was cancelled at a checkpoint
    Cancelled,
    /// The LLM service stayed overloaded for every attempt
    TransientServiceOverload,
    /// A remote service answered with a non-success status
    RemoteRejected(u16),
    /// The model answer contained no usable recipe object
    Unparseable,
    /// The destination database has no title property
    NoTitleProperty,
    /// Network or I/O failure before a status was received
    Transport,
}

/// Raised by a cancelled [`SessionToken`](crate::session::SessionToken) checkpoint
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Processing cancelled by user")]
pub struct Cancelled;

/// Errors that can occur while extracting a recipe with the LLM
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No LLM API key available
    #[error("Claude API key not configured")]
    CredentialMissing,

    /// Session cancelled before or after the LLM call
    #[error("Processing cancelled by user")]
    Cancelled,

    /// Every attempt hit the overloaded response class
    #[error("Claude API overloaded after {attempts} attempts")]
    Overloaded { attempts: u32 },

    /// Terminal non-success response (rate limits and auth errors included)
    #[error("Claude API error: {status} {message}")]
    RemoteRejected { status: u16, message: String },

    /// Request failed before a response arrived, or the envelope was malformed
    #[error("Claude API request failed: {0}")]
    Transport(String),

    /// None of the parsing strategies found a recipe object
    #[error("Could not parse recipe data from Claude response")]
    Unparseable,
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::CredentialMissing => ErrorKind::CredentialMissing,
            ExtractionError::Cancelled => ErrorKind::Cancelled,
            ExtractionError::Overloaded { .. } => ErrorKind::TransientServiceOverload,
            ExtractionError::RemoteRejected { status, .. } => ErrorKind::RemoteRejected(*status),
            ExtractionError::Transport(_) => ErrorKind::Transport,
            ExtractionError::Unparseable => ErrorKind::Unparseable,
        }
    }
}

impl From<Cancelled> for ExtractionError {
    fn from(_: Cancelled) -> Self {
        ExtractionError::Cancelled
    }
}

impl From<LlmError> for ExtractionError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey => ExtractionError::CredentialMissing,
            LlmError::Overloaded { .. } => ExtractionError::Overloaded { attempts: 1 },
            LlmError::Api { status, message } => {
                ExtractionError::RemoteRejected { status, message }
            }
            LlmError::Request(msg) | LlmError::InvalidResponse(msg) => {
                ExtractionError::Transport(msg)
            }
        }
    }
}

/// Errors that can occur while writing a recipe into the Notion database
#[derive(Error, Debug)]
pub enum ImportError {
    /// Notion token or database id not configured
    #[error("Notion API credentials not configured")]
    CredentialMissing,

    /// Session cancelled around the page creation call
    #[error("Processing cancelled by user")]
    Cancelled,

    /// Database schema has no property of type title
    #[error("No title property found in the database")]
    NoTitleProperty,

    /// Schema fetch or page creation answered with a non-success status
    #[error("Notion API error: {status} {message}")]
    RemoteRejected { status: u16, message: String },

    /// Failed to reach the Notion API or decode its answer
    #[error("Notion API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::CredentialMissing => ErrorKind::CredentialMissing,
            ImportError::Cancelled => ErrorKind::Cancelled,
            ImportError::NoTitleProperty => ErrorKind::NoTitleProperty,
            ImportError::RemoteRejected { status, .. } => ErrorKind::RemoteRejected(*status),
            ImportError::Transport(_) => ErrorKind::Transport,
        }
    }
}

impl From<Cancelled> for ImportError {
    fn from(_: Cancelled) -> Self {
        ImportError::Cancelled
    }
}

/// Failure of a whole extract + import session
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Extraction(e) => e.kind(),
            PipelineError::Import(e) => e.kind(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_converts_into_both_stages() {
        let extraction: ExtractionError = Cancelled.into();
        let import: ImportError = Cancelled.into();
        assert_eq!(extraction.kind(), ErrorKind::Cancelled);
        assert_eq!(import.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_llm_error_mapping() {
        let err: ExtractionError = LlmError::Api {
            status: 401,
            message: "invalid x-api-key".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected(401));

        let err: ExtractionError = LlmError::MissingApiKey.into();
        assert_eq!(err.kind(), ErrorKind::CredentialMissing);
    }

    #[test]
    fn test_pipeline_error_message_is_transparent() {
        let err = PipelineError::from(ImportError::NoTitleProperty);
        assert_eq!(err.to_string(), "No title property found in the database");
        assert!(!err.is_cancelled());
        assert!(PipelineError::from(ExtractionError::Cancelled).is_cancelled());
    }
}
