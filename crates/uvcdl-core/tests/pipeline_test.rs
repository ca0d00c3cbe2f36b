#![allow(clippy::unwrap_used)]
// End-to-end pipeline tests against an in-memory controller.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::stream;
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;
use url::Url;

use uvcdl_core::{
    Camera, CameraId, ControllerApi, CoreError, Credentials, DownloadConfig, DownloadStatus,
    FailureReason, PageRequest, Pipeline, RecordingCause, RetryPolicy, RunRequest, Segment,
    SegmentBody, SegmentId, SegmentPage, SessionToken, SkipReason, TimeRange, TransferError,
};

// ── Fake controller ─────────────────────────────────────────────────

const PASSWORD: &str = "hunter2";

#[derive(Default)]
struct Behaviour {
    /// Overlap every page after the first by one record.
    drift: bool,
    /// Listing fails at this offset.
    fail_page_at: Option<u64>,
    /// Segment ids answered with 404.
    missing: HashSet<String>,
    /// Remaining transient failures per segment id.
    transient: HashMap<String, u32>,
    /// Segment ids whose declared length exceeds the body.
    truncated: HashSet<String>,
    /// Segment ids whose body never finishes.
    stalled: HashSet<String>,
    /// Tokens the controller no longer accepts.
    expired: HashSet<String>,
}

struct FakeController {
    url: Url,
    cameras: Vec<Camera>,
    segments: Vec<Segment>,
    behaviour: Mutex<Behaviour>,
    /// Downloads presenting an expired token wait here together.
    expiry_barrier: Option<Barrier>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
    list_calls: AtomicUsize,
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeController {
    fn new(segments: Vec<Segment>) -> Self {
        Self {
            url: Url::parse("https://nvr.test:7443").unwrap(),
            cameras: vec![
                camera("cam-garage", "Garage"),
                camera("cam1", "Camera 1"),
                camera("cam-porch-a", "Porch"),
                camera("cam-porch-b", "Porch"),
            ],
            segments,
            behaviour: Mutex::new(Behaviour::default()),
            expiry_barrier: None,
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with(self, f: impl FnOnce(&mut Behaviour)) -> Self {
        f(&mut self.behaviour.lock().unwrap());
        self
    }

    fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn token_value(token: &SessionToken) -> String {
    token
        .cookie()
        .map(|c| c.expose_secret().to_owned())
        .unwrap_or_default()
}

fn payload(id: &SegmentId) -> Vec<u8> {
    format!("video:{id};").repeat(64).into_bytes()
}

#[async_trait]
impl ControllerApi for FakeController {
    fn base_url(&self) -> &Url {
        &self.url
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, CoreError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if credentials.password.expose_secret() != PASSWORD {
            return Err(CoreError::AuthenticationFailed {
                message: "login failed (HTTP 401)".into(),
            });
        }
        Ok(SessionToken::from_cookie(format!("session-{n}")))
    }

    async fn logout(&self, _: &SessionToken) -> Result<(), CoreError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_cameras(&self, _: &SessionToken) -> Result<Vec<Camera>, CoreError> {
        Ok(self.cameras.clone())
    }

    async fn list_recordings_page(
        &self,
        _: &SessionToken,
        request: &PageRequest,
    ) -> Result<SegmentPage, CoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let (drift, fail_at) = {
            let b = self.behaviour.lock().unwrap();
            (b.drift, b.fail_page_at)
        };
        if fail_at == Some(request.offset) {
            return Err(CoreError::Query {
                message: "malformed controller response".into(),
            });
        }

        // Server-side filtering is loose: touching segments come back too.
        let mut matching: Vec<Segment> = self
            .segments
            .iter()
            .filter(|s| {
                s.camera_id == request.camera_id
                    && s.start <= request.range.end()
                    && s.end >= request.range.start()
            })
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.start);

        let total = matching.len();
        let mut offset = usize::try_from(request.offset).unwrap();
        if drift && offset > 0 {
            offset -= 1;
        }
        let limit = usize::try_from(request.limit).unwrap();

        Ok(SegmentPage {
            segments: matching.into_iter().skip(offset).take(limit).collect(),
            total_count: Some(u64::try_from(total).unwrap()),
        })
    }

    async fn open_segment(
        &self,
        token: &SessionToken,
        segment: &Segment,
    ) -> Result<SegmentBody, TransferError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = segment.id.as_str().to_owned();
        let token = token_value(token);

        let expired = self.behaviour.lock().unwrap().expired.contains(&token);
        if expired {
            if let Some(ref barrier) = self.expiry_barrier {
                barrier.wait().await;
            }
            return Err(TransferError::SessionExpired);
        }

        let (missing, transient, truncated, stalled) = {
            let mut b = self.behaviour.lock().unwrap();
            let transient = match b.transient.get_mut(&id) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            };
            (
                b.missing.contains(&id),
                transient,
                b.truncated.contains(&id),
                b.stalled.contains(&id),
            )
        };

        if missing {
            return Err(TransferError::Permanent {
                status: Some(404),
                message: "recording not found".into(),
            });
        }
        if transient {
            return Err(TransferError::Transient("HTTP 503: busy".into()));
        }

        let body = payload(&segment.id);
        let len = u64::try_from(body.len()).unwrap();
        let (head, tail) = body.split_at(body.len() / 2);
        let head = Bytes::copy_from_slice(head);
        let tail = Bytes::copy_from_slice(tail);

        if stalled {
            return Ok(SegmentBody {
                content_length: Some(len),
                stream: Box::pin(
                    stream::iter([Ok::<_, TransferError>(head)]).chain(stream::pending()),
                ),
            });
        }

        Ok(SegmentBody {
            content_length: Some(if truncated { len + 100 } else { len }),
            stream: Box::pin(stream::iter([Ok::<_, TransferError>(head), Ok(tail)])),
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 10, 5, h, m, 0).unwrap()
}

fn camera(id: &str, name: &str) -> Camera {
    Camera {
        id: CameraId::new(id),
        display_name: name.into(),
        host: None,
        last_recording_start: None,
    }
}

fn segment(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Segment {
    Segment {
        id: SegmentId::new(id),
        camera_id: CameraId::new("cam1"),
        start,
        end,
        size_hint: None,
        in_progress: false,
        cause: RecordingCause::FullTime,
        locked: false,
    }
}

/// `count` back-to-back five-minute segments from 10:00.
fn consecutive(count: u32) -> Vec<Segment> {
    (0..count)
        .map(|i| {
            let start = at(10, 0) + chrono::Duration::minutes(i64::from(i) * 5);
            segment(&format!("rec{i}"), start, start + chrono::Duration::minutes(5))
        })
        .collect()
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        username: "admin".into(),
        password: SecretString::from(password.to_owned()),
    }
}

fn download_config(dir: &Path) -> DownloadConfig {
    DownloadConfig {
        output_dir: dir.to_path_buf(),
        max_connections: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        page_size: 100,
        max_pages: 1000,
    }
}

fn pipeline(api: &Arc<FakeController>, config: DownloadConfig) -> Pipeline<FakeController> {
    Pipeline::new(Arc::clone(api), credentials(PASSWORD), None, config)
}

fn request(start: DateTime<Utc>, end: DateTime<Utc>) -> RunRequest {
    RunRequest {
        camera_name: "Camera 1".into(),
        range: TimeRange::new(start, end).unwrap(),
        dry_run: false,
    }
}

/// Every file under `dir`, recursively.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}

fn part_files(dir: &Path) -> Vec<PathBuf> {
    files_under(dir)
        .into_iter()
        .filter(|p| p.to_string_lossy().ends_with(".part"))
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_downloads_only_overlapping_segments() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(vec![
        segment("a", at(10, 0), at(10, 5)),
        segment("b", at(10, 4), at(10, 10)),
        segment("c", at(11, 0), at(11, 5)),
    ]));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(10, 6)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.skipped(), 0);
    assert!(summary.is_success());

    let mut ids: Vec<&str> = summary.results.iter().map(|r| r.segment.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "b"]);

    let expected = dir
        .path()
        .join("camera_1")
        .join("camera_1_20181005T100000.000Z_20181005T100500.000Z.mp4");
    assert_eq!(
        std::fs::read(&expected).unwrap(),
        payload(&SegmentId::new("a"))
    );
    assert_eq!(files_under(dir.path()).len(), 2);
    assert!(part_files(dir.path()).is_empty());
    assert_eq!(api.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn segment_touching_range_start_is_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(vec![
        segment("before", at(9, 55), at(10, 0)),
        segment("inside", at(10, 1), at(10, 3)),
        segment("after", at(10, 6), at(10, 9)),
    ]));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(10, 6)), &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = summary
        .planned
        .iter()
        .map(|p| p.segment.id.as_str())
        .collect();
    assert_eq!(ids, vec!["inside"]);
    assert_eq!(summary.results.len(), 1);
}

#[tokio::test]
async fn wrong_password_aborts_before_listing() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(3)));
    let pipeline = Pipeline::new(
        Arc::clone(&api),
        credentials("wrong"),
        None,
        download_config(dir.path()),
    );

    let err = pipeline
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::AuthenticationFailed { .. }), "{err:?}");
    assert_eq!(api.logins(), 1);
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.opens(), 0);
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn listing_is_idempotent_across_drifting_pages() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(7)).with(|b| b.drift = true));
    let config = DownloadConfig {
        page_size: 2,
        ..download_config(dir.path())
    };

    let mut dry = request(at(10, 0), at(12, 0));
    dry.dry_run = true;

    let first = pipeline(&api, config.clone())
        .run(&dry, &CancellationToken::new())
        .await
        .unwrap();
    let second = pipeline(&api, config)
        .run(&dry, &CancellationToken::new())
        .await
        .unwrap();

    let ids = |s: &uvcdl_core::RunSummary| -> Vec<String> {
        s.planned.iter().map(|p| p.segment.id.to_string()).collect()
    };
    let expected: Vec<String> = (0..7).map(|i| format!("rec{i}")).collect();

    assert_eq!(ids(&first), expected);
    assert_eq!(ids(&second), expected);
    assert!(first.results.is_empty());
    assert_eq!(api.opens(), 0);
}

#[tokio::test]
async fn failed_page_aborts_the_whole_listing() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(6)).with(|b| b.fail_page_at = Some(2)));
    let config = DownloadConfig {
        page_size: 2,
        ..download_config(dir.path())
    };

    let err = pipeline(&api, config)
        .run(&request(at(10, 0), at(12, 0)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Query { .. }), "{err:?}");
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(api.opens(), 0);
    assert_eq!(api.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn runaway_listing_hits_page_bound() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(10)));
    let config = DownloadConfig {
        page_size: 1,
        max_pages: 3,
        ..download_config(dir.path())
    };

    let err = pipeline(&api, config)
        .run(&request(at(10, 0), at(12, 0)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Query { .. }), "{err:?}");
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn one_failing_segment_does_not_abort_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(4)).with(|b| {
        b.missing.insert("rec2".into());
    }));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 4);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());

    let failures: Vec<_> = summary.failures().collect();
    assert_eq!(failures[0].0.segment.id.as_str(), "rec2");
    assert_eq!(
        failures[0].1,
        &FailureReason::Permanent {
            message: "recording not found".into(),
            status: Some(404),
        }
    );
    // Permanent failures are not retried.
    assert_eq!(failures[0].0.attempts, 1);
    assert_eq!(files_under(dir.path()).len(), 3);
    assert!(part_files(dir.path()).is_empty());
}

#[tokio::test]
async fn rerun_skips_everything_already_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(3)));
    let cancel = CancellationToken::new();

    let first = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &cancel)
        .await
        .unwrap();
    assert_eq!(first.succeeded(), 3);
    let opens_after_first = api.opens();

    let second = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &cancel)
        .await
        .unwrap();

    assert_eq!(second.results.len(), 3);
    assert!(
        second
            .results
            .iter()
            .all(|r| r.status == DownloadStatus::Skipped(SkipReason::AlreadyDownloaded))
    );
    assert!(second.results.iter().all(|r| r.local_path.is_some()));
    assert_eq!(api.opens(), opens_after_first);
}

#[tokio::test]
async fn concurrent_session_expiry_coalesces_into_one_relogin() {
    const K: usize = 4;
    let dir = tempfile::tempdir().unwrap();

    let mut fake = FakeController::new(consecutive(4)).with(|b| {
        b.expired.insert("session-1".into());
    });
    fake.expiry_barrier = Some(Barrier::new(K));
    let api = Arc::new(fake);

    let config = DownloadConfig {
        max_connections: K,
        ..download_config(dir.path())
    };
    let summary = pipeline(&api, config)
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await;

    // Listing ran with session-1 too; only downloads reject it.
    let summary = summary.unwrap();
    assert_eq!(summary.succeeded(), K);
    assert_eq!(api.logins(), 2, "K expiries must share one re-login");
    assert!(summary.results.iter().all(|r| r.attempts == 2));
}

#[tokio::test]
async fn second_expiry_after_relogin_fails_the_segment() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)).with(|b| {
        b.expired.insert("session-1".into());
        b.expired.insert("session-2".into());
    }));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.results[0].status,
        DownloadStatus::Failed(FailureReason::SessionLost { .. })
    ));
    assert_eq!(api.logins(), 2);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)).with(|b| {
        b.transient.insert("rec0".into(), 2);
    }));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.results[0].attempts, 3);
}

#[tokio::test]
async fn transient_failures_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)).with(|b| {
        b.transient.insert("rec0".into(), 10);
    }));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        summary.results[0].status,
        DownloadStatus::Failed(FailureReason::Transient { attempts: 3, .. })
    ));
    assert_eq!(api.opens(), 3);
}

#[tokio::test]
async fn truncated_body_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)).with(|b| {
        b.truncated.insert("rec0".into());
    }));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.results[0].status,
        DownloadStatus::Failed(FailureReason::Transient { .. })
    ));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn cancellation_mid_transfer_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(2)).with(|b| {
        b.stalled.insert("rec1".into());
    }));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &cancel)
        .await
        .unwrap();

    let by_id: HashMap<&str, &DownloadStatus> = summary
        .results
        .iter()
        .map(|r| (r.segment.id.as_str(), &r.status))
        .collect();
    assert_eq!(by_id["rec0"], &DownloadStatus::Success);
    assert_eq!(
        by_id["rec1"],
        &DownloadStatus::Failed(FailureReason::Cancelled)
    );
    assert!(part_files(dir.path()).is_empty());
    assert_eq!(files_under(dir.path()).len(), 1);
}

#[tokio::test]
async fn cancellation_before_start_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(2)));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Cancelled));
    assert_eq!(api.opens(), 0);
}

#[tokio::test]
async fn still_recording_segment_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut segments = consecutive(2);
    segments[1].in_progress = true;
    let api = Arc::new(FakeController::new(segments));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(api.opens(), 1);
}

#[tokio::test]
async fn segments_sharing_an_interval_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut motion = segment("motion", at(10, 0), at(10, 5));
    motion.cause = RecordingCause::Motion;
    let api = Arc::new(FakeController::new(vec![
        segment("fulltime", at(10, 0), at(10, 5)),
        motion,
    ]));

    let summary = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.skipped(), 0);
    assert_eq!(api.opens(), 2);

    let folder = dir.path().join("camera_1");
    assert_eq!(
        files_under(dir.path()),
        vec![
            folder.join("camera_1_20181005T100000.000Z_20181005T100500.000Z_fulltime.mp4"),
            folder.join("camera_1_20181005T100000.000Z_20181005T100500.000Z_motion.mp4"),
        ]
    );
    for id in ["fulltime", "motion"] {
        let path = folder.join(format!(
            "camera_1_20181005T100000.000Z_20181005T100500.000Z_{id}.mp4"
        ));
        assert_eq!(std::fs::read(path).unwrap(), payload(&SegmentId::new(id)));
    }

    // Same listing, same names: the re-run fetches nothing.
    let rerun = pipeline(&api, download_config(dir.path()))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(rerun.skipped(), 2);
    assert_eq!(api.opens(), 2);
}

#[tokio::test]
async fn concurrency_limit_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(8)));
    let config = DownloadConfig {
        max_connections: 2,
        ..download_config(dir.path())
    };

    let summary = pipeline(&api, config)
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 8);
    let peak = api.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency {peak} exceeds limit");
    assert!(peak >= 2, "downloads never overlapped");
}

#[tokio::test]
async fn dry_run_plans_without_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("not-yet");
    let api = Arc::new(FakeController::new(consecutive(2)));

    let mut dry = request(at(10, 0), at(11, 0));
    dry.dry_run = true;
    let summary = pipeline(&api, download_config(&out))
        .run(&dry, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.planned.len(), 2);
    assert_eq!(
        summary.planned[0].path,
        out.join("camera_1")
            .join("camera_1_20181005T100000.000Z_20181005T100500.000Z.mp4")
    );
    assert!(!out.exists());
    assert_eq!(api.opens(), 0);
}

#[tokio::test]
async fn output_path_that_is_a_file_is_rejected_before_login() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("occupied");
    std::fs::write(&file, b"x").unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)));

    let err = pipeline(&api, download_config(&file))
        .run(&request(at(10, 0), at(11, 0)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::OutputDirectory { .. }));
    assert_eq!(api.logins(), 0);
}

#[tokio::test]
async fn unknown_and_ambiguous_camera_names() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeController::new(consecutive(1)));

    let mut missing = request(at(10, 0), at(11, 0));
    missing.camera_name = "camera 1".into();
    let err = pipeline(&api, download_config(dir.path()))
        .run(&missing, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CameraNotFound { .. }), "{err:?}");

    let mut ambiguous = request(at(10, 0), at(11, 0));
    ambiguous.camera_name = "Porch".into();
    let err = pipeline(&api, download_config(dir.path()))
        .run(&ambiguous, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        CoreError::AmbiguousCameraName { ids, .. } => {
            assert_eq!(ids, vec!["cam-porch-a", "cam-porch-b"]);
        }
        other => panic!("expected AmbiguousCameraName, got {other:?}"),
    }

    assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_cameras_logs_in_and_out() {
    let api = Arc::new(FakeController::new(Vec::new()));
    let dir = tempfile::tempdir().unwrap();

    let cameras = pipeline(&api, download_config(dir.path()))
        .list_cameras(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(cameras.len(), 4);
    assert_eq!(api.logins(), 1);
    assert_eq!(api.logouts.load(Ordering::SeqCst), 1);
}
