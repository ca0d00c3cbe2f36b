// ── API-to-domain type conversions ──
//
// Bridges raw `uvcdl_api` response types into canonical `model` types.
// Timestamps arrive as epoch milliseconds.

use chrono::{DateTime, Utc};

use uvcdl_api::{UvcCamera, UvcRecording};

use crate::model::{Camera, CameraId, RecordingCause, Segment, SegmentId};

fn epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

impl From<UvcCamera> for Camera {
    fn from(c: UvcCamera) -> Self {
        let display_name = c.display_name().unwrap_or_default().to_owned();
        Camera {
            id: CameraId::new(c.id),
            display_name,
            host: c.host,
            last_recording_start: c.last_recording_start_time.and_then(epoch_ms),
        }
    }
}

/// Convert a listed recording into a [`Segment`] scoped to `camera_id`.
///
/// A clip still being written may have no end yet; it is given the
/// provisional end `now` (never before its start) so range filtering keeps
/// it. Returns `None` for records whose timestamps are out of range, whose
/// end precedes their start, or that are finished but carry no end.
pub fn segment_from_recording(camera_id: &CameraId, r: UvcRecording) -> Option<Segment> {
    let start = epoch_ms(r.start_time)?;
    let end = match r.end_time {
        Some(ms) => epoch_ms(ms)?,
        None if r.in_progress => Utc::now().max(start),
        None => return None,
    };
    if end < start {
        return None;
    }

    Some(Segment {
        id: SegmentId::new(r.id),
        camera_id: camera_id.clone(),
        start,
        end,
        size_hint: r.file_size,
        in_progress: r.in_progress,
        cause: RecordingCause::from_event_type(r.event_type.as_deref()),
        locked: r.locked,
    })
}
