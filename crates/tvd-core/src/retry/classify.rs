//! Classify extractor errors into retry policy error kinds.

use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::retry::policy::ErrorKind;

/// Classify an extractor error for retry decisions.
///
/// Only transient failures are retryable; a missing binary, an abort, or
/// media that is private/unsupported/too large will fail the same way again.
pub fn classify(e: &ExtractorError) -> ErrorKind {
    match e {
        ExtractorError::Timeout(_) => ErrorKind::Timeout,
        ExtractorError::Failed { kind, .. } => match kind {
            ExtractorErrorKind::Throttled => ErrorKind::Throttled,
            ExtractorErrorKind::Network => ErrorKind::Connection,
            ExtractorErrorKind::Unsupported
            | ExtractorErrorKind::Unavailable
            | ExtractorErrorKind::TooLarge
            | ExtractorErrorKind::Other => ErrorKind::Other,
        },
        ExtractorError::NotFound(_)
        | ExtractorError::Spawn(_)
        | ExtractorError::Io(_)
        | ExtractorError::Parse(_)
        | ExtractorError::NoOutput
        | ExtractorError::Aborted => ErrorKind::Other,
    }
}
