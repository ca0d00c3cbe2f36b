// ── Per-segment outcomes and the run summary ──

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use strum::Display;

use super::camera::Camera;
use super::segment::{Segment, SegmentId};
use super::time_range::TimeRange;

/// Why a segment was not transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The final file already exists with the expected size.
    AlreadyDownloaded,
    /// The controller is still writing the segment.
    StillRecording,
}

/// Why a segment transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Retries exhausted on network errors, 5xx, or truncated bodies.
    Transient { message: String, attempts: u32 },
    /// The controller refused the segment (4xx other than auth).
    Permanent {
        message: String,
        status: Option<u16>,
    },
    /// Re-login failed or the session was rejected again after re-login.
    SessionLost { message: String },
    /// Local filesystem failure.
    Io { message: String },
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient { message, attempts } => {
                write!(f, "{message} (after {attempts} attempts)")
            }
            Self::Permanent {
                message,
                status: Some(status),
            } => write!(f, "HTTP {status}: {message}"),
            Self::Permanent {
                message,
                status: None,
            } => f.write_str(message),
            Self::SessionLost { message } => write!(f, "session lost: {message}"),
            Self::Io { message } => write!(f, "I/O error: {message}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DownloadStatus {
    Success,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl DownloadStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Result for exactly one input segment. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub segment: Segment,
    pub status: DownloadStatus,
    /// Final file path. Set on success and on `Skipped(AlreadyDownloaded)`.
    pub local_path: Option<PathBuf>,
    /// Bytes written during this run.
    pub bytes: u64,
    /// Transfer attempts made (0 when skipped).
    pub attempts: u32,
}

impl DownloadResult {
    pub fn segment_id(&self) -> &SegmentId {
        &self.segment.id
    }
}

/// A segment and where it would be written, reported by dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedSegment {
    pub segment: Segment,
    pub path: PathBuf,
}

/// Aggregate report for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub camera: Camera,
    pub range: TimeRange,
    pub dry_run: bool,
    /// Every listed segment with its target path, in listing order.
    pub planned: Vec<PlannedSegment>,
    /// One entry per listed segment; empty on dry runs.
    pub results: Vec<DownloadResult>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_skipped()).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.results.iter().map(|r| r.bytes).sum()
    }

    /// Failed entries with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&DownloadResult, &FailureReason)> {
        self.results.iter().filter_map(|r| match &r.status {
            DownloadStatus::Failed(reason) => Some((r, reason)),
            _ => None,
        })
    }

    /// Zero failed segments.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
