//! Core types and events for image fetching

use crate::error::{DownloadError, Error};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a submitted fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchId(pub u64);

impl FetchId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for FetchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FetchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One image download: where it comes from and where it lands
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTask {
    /// Fetch identifier
    pub id: FetchId,
    /// Source URL
    pub url: String,
    /// Full destination path (directory joined with the sanitized basename)
    pub destination: PathBuf,
}

/// Lifecycle stage of a fetch task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    /// Registered, waiting for a transport slot
    Submitted,
    /// Request in progress
    InFlight,
    /// File written
    Completed,
    /// Request or write failed
    Failed,
    /// Abandoned before finishing
    Cancelled,
}

impl FetchStage {
    /// Whether the task can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FetchStage::Completed | FetchStage::Failed | FetchStage::Cancelled
        )
    }
}

/// Terminal result of one fetch task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response body was written to `path`
    Completed {
        /// File that was written
        path: PathBuf,
    },
    /// The fetch failed; nothing usable was written
    Failed(DownloadError),
    /// The fetch was abandoned
    Cancelled,
}

impl FetchOutcome {
    /// The stage this outcome corresponds to
    pub fn stage(&self) -> FetchStage {
        match self {
            FetchOutcome::Completed { .. } => FetchStage::Completed,
            FetchOutcome::Failed(_) => FetchStage::Failed,
            FetchOutcome::Cancelled => FetchStage::Cancelled,
        }
    }
}

/// Events emitted by the fetcher
///
/// Subscribe via [`Fetcher::subscribe`](crate::fetcher::Fetcher::subscribe).
#[derive(Clone, Debug)]
pub enum FetchEvent {
    /// A fetch acquired a transport slot and started its request
    Started {
        /// Fetch identifier
        id: FetchId,
        /// Source URL
        url: String,
    },
    /// A fetch wrote its file
    Completed {
        /// Fetch identifier
        id: FetchId,
        /// Source URL
        url: String,
        /// File that was written
        path: PathBuf,
    },
    /// A fetch failed
    Failed {
        /// Fetch identifier
        id: FetchId,
        /// Source URL
        url: String,
        /// Why it failed
        error: DownloadError,
    },
    /// A fetch was abandoned
    Cancelled {
        /// Fetch identifier
        id: FetchId,
        /// Source URL
        url: String,
    },
}

/// Aggregate of every terminal outcome observed by a fetcher
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Files written, in completion order
    pub completed: Vec<PathBuf>,
    /// Failed fetches with their cause
    pub failed: Vec<DownloadError>,
    /// Fetches abandoned before finishing, as [`DownloadError::Cancelled`]
    pub cancelled: Vec<DownloadError>,
}

impl FetchReport {
    /// Record one terminal outcome
    pub(crate) fn record(&mut self, url: &str, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Completed { path } => self.completed.push(path.clone()),
            FetchOutcome::Failed(e) => self.failed.push(e.clone()),
            FetchOutcome::Cancelled => self.cancelled.push(DownloadError::Cancelled {
                url: url.to_string(),
            }),
        }
    }

    /// Every fetch that produced no file, failed first, as crate errors
    ///
    /// These never abort a run; they exist for logging and reporting.
    pub fn errors(&self) -> impl Iterator<Item = Error> + '_ {
        self.failed
            .iter()
            .chain(&self.cancelled)
            .cloned()
            .map(Error::from)
    }

    /// Number of tasks that reached a terminal state
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.cancelled.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_id_display() {
        assert_eq!(FetchId(42).to_string(), "42");
        assert_eq!(FetchId::from(7).get(), 7);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(!FetchStage::Submitted.is_terminal());
        assert!(!FetchStage::InFlight.is_terminal());
        assert!(FetchStage::Completed.is_terminal());
        assert!(FetchStage::Failed.is_terminal());
        assert!(FetchStage::Cancelled.is_terminal());
    }

    #[test]
    fn test_report_counts_every_outcome() {
        let mut report = FetchReport::default();
        report.record(
            "http://h/a.jpg",
            &FetchOutcome::Completed {
                path: PathBuf::from("/tmp/a.jpg"),
            },
        );
        report.record(
            "http://h/b.jpg",
            &FetchOutcome::Failed(DownloadError::Timeout {
                url: "http://h/b.jpg".into(),
            }),
        );
        report.record("http://h/c.jpg", &FetchOutcome::Cancelled);

        assert_eq!(report.total(), 3);
        assert_eq!(report.completed, vec![PathBuf::from("/tmp/a.jpg")]);
        assert_eq!(report.failed[0].url(), "http://h/b.jpg");
        assert_eq!(
            report.cancelled,
            vec![DownloadError::Cancelled {
                url: "http://h/c.jpg".into()
            }]
        );

        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| !e.is_fatal()));
        assert_eq!(errors[0].error_code(), "timeout");
        assert_eq!(errors[1].error_code(), "cancelled");
        assert_eq!(
            FetchOutcome::Cancelled.stage(),
            FetchStage::Cancelled
        );
    }
}
