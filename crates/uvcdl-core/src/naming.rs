// ── Deterministic output naming ──
//
// Final names are a pure function of (camera name, segment start, segment
// end), so identical runs produce identical paths. Segments of one listing
// that share an interval (a full-time and a motion clip, say) are told
// apart by a `_<id>` suffix, so distinct segments never collide. In-flight
// bytes go to a hidden `.part` sibling that is renamed into place only once
// complete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::Segment;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const EXTENSION: &str = "mp4";
const PART_SUFFIX: &str = "part";

/// Lowercase `name`, collapsing every run of non-alphanumerics into `_`.
pub fn camera_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("camera");
    }
    slug
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// `<slug>_<start>_<end>.mp4`
fn segment_file_name(slug: &str, segment: &Segment) -> String {
    format!(
        "{slug}_{}_{}.{EXTENSION}",
        timestamp(segment.start),
        timestamp(segment.end)
    )
}

/// Planned final paths for one listing, index-aligned with `segments`:
/// `<output_dir>/<slug>/<slug>_<start>_<end>.mp4`.
///
/// Paths that would be shared by more than one segment all get the
/// segment id appended, so the result never depends on listing order.
pub fn planned_paths(output_dir: &Path, camera_name: &str, segments: &[Segment]) -> Vec<PathBuf> {
    let slug = camera_slug(camera_name);
    let dir = output_dir.join(&slug);
    let names: Vec<String> = segments
        .iter()
        .map(|segment| segment_file_name(&slug, segment))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &names {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    segments
        .iter()
        .zip(&names)
        .map(|(segment, name)| {
            if counts.get(name.as_str()).copied().unwrap_or_default() > 1 {
                debug!(segment = %segment.id, name, "interval shared with another segment");
                dir.join(format!(
                    "{slug}_{}_{}_{}.{EXTENSION}",
                    timestamp(segment.start),
                    timestamp(segment.end),
                    file_safe_id(segment)
                ))
            } else {
                dir.join(name)
            }
        })
        .collect()
}

fn file_safe_id(segment: &Segment) -> String {
    segment
        .id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Temporary sibling of `final_path`: `.<final name>.<segment id>.part`.
pub fn part_path(final_path: &Path, segment: &Segment) -> PathBuf {
    let file = final_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = file_safe_id(segment);
    final_path.with_file_name(format!(".{file}.{id}.{PART_SUFFIX}"))
}

/// Whether `path` names an in-flight temporary file.
pub fn is_part_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|f| f.to_str())
        .is_some_and(|f| f.starts_with('.') && f.ends_with(&format!(".{PART_SUFFIX}")))
}

/// Removes the temporary file on drop unless disarmed.
///
/// Covers every exit from a transfer: error returns, cancellation (the
/// transfer future is dropped), and panics.
#[derive(Debug)]
pub struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file has been renamed into place; stop guarding it.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "could not remove partial file"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{CameraId, RecordingCause, SegmentId};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn segment(id: &str) -> Segment {
        let start = Utc.with_ymd_and_hms(2018, 10, 5, 10, 0, 0).unwrap();
        Segment {
            id: SegmentId::new(id),
            camera_id: CameraId::new("cam1"),
            start,
            end: start + chrono::Duration::milliseconds(300_250),
            size_hint: None,
            in_progress: false,
            cause: RecordingCause::FullTime,
            locked: false,
        }
    }

    fn single_path(segment: &Segment) -> PathBuf {
        planned_paths(Path::new("/videos"), "Camera 1", std::slice::from_ref(segment))
            .remove(0)
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(camera_slug("Camera 1"), "camera_1");
        assert_eq!(camera_slug("  Front -- Door!! "), "front_door");
        assert_eq!(camera_slug("G3/Flex (garage)"), "g3_flex_garage");
        assert_eq!(camera_slug("***"), "camera");
    }

    #[test]
    fn final_path_is_deterministic() {
        let path = single_path(&segment("rec1"));
        assert_eq!(
            path,
            PathBuf::from(
                "/videos/camera_1/camera_1_20181005T100000.000Z_20181005T100500.250Z.mp4"
            )
        );
        assert_eq!(path, single_path(&segment("other-id")));
    }

    #[test]
    fn shared_interval_paths_are_disambiguated() {
        let mut later = segment("later");
        later.start += chrono::Duration::minutes(10);
        later.end += chrono::Duration::minutes(10);
        let segments = vec![segment("fulltime"), segment("motion/1"), later.clone()];

        let paths = planned_paths(Path::new("/videos"), "Camera 1", &segments);
        assert_eq!(
            paths,
            vec![
                PathBuf::from(
                    "/videos/camera_1/camera_1_20181005T100000.000Z_20181005T100500.250Z_fulltime.mp4"
                ),
                PathBuf::from(
                    "/videos/camera_1/camera_1_20181005T100000.000Z_20181005T100500.250Z_motion_1.mp4"
                ),
                single_path(&later),
            ]
        );

        let reversed: Vec<Segment> = segments.iter().rev().cloned().collect();
        let mut again = planned_paths(Path::new("/videos"), "Camera 1", &reversed);
        again.reverse();
        assert_eq!(paths, again);
    }

    #[test]
    fn part_path_is_hidden_sibling() {
        let seg = segment("5bb7/a");
        let final_path = single_path(&seg);
        let part = part_path(&final_path, &seg);

        assert_eq!(part.parent(), final_path.parent());
        assert_eq!(
            part.file_name().unwrap().to_str().unwrap(),
            ".camera_1_20181005T100000.000Z_20181005T100500.250Z.mp4.5bb7_a.part"
        );
        assert!(is_part_file(&part));
        assert!(!is_part_file(&final_path));
    }

    #[test]
    fn part_file_guard_removes_unless_disarmed() {
        let dir = tempfile::tempdir().unwrap();

        let dropped = dir.path().join(".a.part");
        std::fs::write(&dropped, b"partial").unwrap();
        drop(PartFile::new(dropped.clone()));
        assert!(!dropped.exists());

        let kept = dir.path().join(".b.part");
        std::fs::write(&kept, b"complete").unwrap();
        PartFile::new(kept.clone()).disarm();
        assert!(kept.exists());
    }
}
