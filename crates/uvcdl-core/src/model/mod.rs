// ── Domain model ──
//
// Canonical representations of what a run works with: the camera, the
// requested time range, the segments found in it, and what happened to
// each one. Consumers (the CLI) depend on these, never on raw API types.

pub mod camera;
pub mod report;
pub mod segment;
pub mod time_range;

// ── Re-exports ──────────────────────────────────────────────────────

pub use camera::{Camera, CameraId};
pub use report::{
    DownloadResult, DownloadStatus, FailureReason, PlannedSegment, RunSummary, SkipReason,
};
pub use segment::{RecordingCause, Segment, SegmentId};
pub use time_range::TimeRange;
