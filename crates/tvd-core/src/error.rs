//! Typed errors for the request lifecycle and the extractor adapter.
//!
//! Store and CLI plumbing stays on `anyhow`; these types exist where callers
//! need to branch on the failure (user-facing replies, retry decisions).

use thiserror::Error;

/// Why a request was refused. Each variant maps to one user-facing reply
/// (`render::refusal`).
#[derive(Debug, Error)]
pub enum BotError {
    #[error("unsupported platform or malformed URL: {0}")]
    UnsupportedPlatform(String),
    #[error("rate limit reached ({limit} requests per hour)")]
    RateLimited { limit: u32 },
    #[error("user is banned")]
    Banned,
    #[error("session expired; send the link again")]
    SessionExpired,
    #[error("playlist downloads are disabled")]
    PlaylistsDisabled,
    #[error("too many pending jobs ({active})")]
    QueueFull { active: i64 },
}

/// Coarse classification of a failed extractor run, derived from its stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorErrorKind {
    /// The tool has no extractor for this URL.
    Unsupported,
    /// Private, removed, geo-blocked, or otherwise unavailable media.
    Unavailable,
    /// Remote side asked us to slow down (HTTP 429).
    Throttled,
    /// Timeouts, resets, DNS, "Unable to download webpage".
    Network,
    /// Result exceeded `--max-filesize`.
    TooLarge,
    Other,
}

impl ExtractorErrorKind {
    /// Classify a line of extractor stderr/stdout.
    pub fn classify(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("larger than max-filesize") {
            ExtractorErrorKind::TooLarge
        } else if m.contains("unsupported url") {
            ExtractorErrorKind::Unsupported
        } else if m.contains("http error 429") || m.contains("too many requests") {
            ExtractorErrorKind::Throttled
        } else if m.contains("private video")
            || m.contains("video unavailable")
            || m.contains("is not available")
            || m.contains("has been removed")
            || m.contains("sign in to confirm")
            || m.contains("not available in your country")
        {
            ExtractorErrorKind::Unavailable
        } else if m.contains("timed out")
            || m.contains("connection reset")
            || m.contains("unable to download webpage")
            || m.contains("temporary failure in name resolution")
            || m.contains("http error 5")
        {
            ExtractorErrorKind::Network
        } else {
            ExtractorErrorKind::Other
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("extractor binary not found: {0}")]
    NotFound(String),
    #[error("failed to run extractor: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),
    #[error("extractor failed ({kind:?}): {message}")]
    Failed {
        kind: ExtractorErrorKind,
        message: String,
    },
    #[error("could not parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("extractor produced no output file")]
    NoOutput,
    #[error("extractor timed out after {0}s")]
    Timeout(u64),
    #[error("download aborted")]
    Aborted,
}

impl ExtractorError {
    /// Build a `Failed` error from captured stderr, keeping the most relevant line.
    pub fn from_stderr(stderr: &str) -> Self {
        let line = stderr
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with("ERROR:"))
            .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
            .unwrap_or("unknown error")
            .trim();
        let message = line.trim_start_matches("ERROR:").trim().to_string();
        ExtractorError::Failed {
            kind: ExtractorErrorKind::classify(line),
            message,
        }
    }

    pub fn kind(&self) -> Option<ExtractorErrorKind> {
        match self {
            ExtractorError::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
