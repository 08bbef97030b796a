//! Error taxonomy for one aggregation run
//!
//! Only persistence and serialization errors are fatal. The other variants are
//! recovered where they happen and show up in logs and run stats.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetch failed, timed out, or returned non-2xx. The source contributes nothing.
    #[error("source unavailable: {source_url}: {reason}")]
    SourceUnavailable { source_url: String, reason: String },

    /// Probe failed or returned a non-live status. The entry is dropped.
    #[error("probe failed: {url}: {reason}")]
    ProbeFailed { url: String, reason: String },

    /// Output artifacts could not be written. Aborts the run.
    #[error("failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize summary: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Notification could not be delivered. Logged, never escalated.
    #[error("notification failed: {0}")]
    Notifier(String),
}

impl PipelineError {
    pub fn source_unavailable(source_url: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_url: source_url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn probe_failed(url: &str, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Serialization(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(PipelineError::persistence("out.m3u", io).is_fatal());
        assert!(!PipelineError::source_unavailable("http://a", "HTTP 404").is_fatal());
        assert!(!PipelineError::probe_failed("http://a/s", "timeout").is_fatal());
        assert!(!PipelineError::Notifier("down".into()).is_fatal());
    }

    #[test]
    fn test_display_includes_source() {
        let err = PipelineError::source_unavailable("http://a/list.m3u", "HTTP 500");
        assert_eq!(err.to_string(), "source unavailable: http://a/list.m3u: HTTP 500");
    }
}
