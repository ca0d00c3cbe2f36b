use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::camera::CameraId;

/// Controller-internal recording identifier (opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the controller recorded this segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordingCause {
    FullTime,
    Motion,
    Other,
}

impl RecordingCause {
    /// Map the controller's `eventType` string.
    pub fn from_event_type(event_type: Option<&str>) -> Self {
        match event_type {
            Some("fullTimeRecording") => Self::FullTime,
            Some("motionRecording") => Self::Motion,
            _ => Self::Other,
        }
    }
}

/// A contiguous recorded interval for one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub camera_id: CameraId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Expected file size in bytes, when the controller reports one.
    pub size_hint: Option<u64>,
    /// The controller is still writing this segment.
    pub in_progress: bool,
    pub cause: RecordingCause,
    pub locked: bool,
}

impl Segment {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}
