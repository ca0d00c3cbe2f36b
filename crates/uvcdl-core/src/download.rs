// ── Segment download manager ──
//
// Bounded-concurrency transfer of listed segments into their final,
// deterministic paths. Each segment streams into a hidden `.part` file
// that is fsynced and renamed into place only when complete; every other
// exit (error, cancellation, dropped future) removes it. Segment failures
// are isolated: one result per input segment, never an early abort.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ControllerApi;
use crate::config::DownloadConfig;
use crate::error::TransferError;
use crate::model::{
    Camera, DownloadResult, DownloadStatus, FailureReason, Segment, SegmentId, SkipReason,
};
use crate::naming::{self, PartFile};
use crate::session::{Session, SessionClient};

const EVENT_CHANNEL_SIZE: usize = 1024;

/// Progress notifications for UI consumers.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// The download phase is starting with `total` segments.
    Planned { total: usize },
    /// A transfer is starting (emitted once per segment, not per attempt).
    Started {
        segment: SegmentId,
        path: PathBuf,
        size_hint: Option<u64>,
    },
    /// `bytes` more bytes of `segment` were written.
    Progress { segment: SegmentId, bytes: u64 },
    /// A transient failure; another attempt follows after `delay`.
    Retrying {
        segment: SegmentId,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// Final outcome of one segment.
    Finished {
        segment: SegmentId,
        status: DownloadStatus,
        bytes: u64,
    },
}

/// Drives bounded-concurrency fetches of segment bytes.
pub struct DownloadManager {
    config: DownloadConfig,
    events: broadcast::Sender<DownloadEvent>,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { config, events }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Subscribe to progress events. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.events.subscribe()
    }

    /// Final paths for a listing of `camera`, index-aligned with `segments`.
    pub fn target_paths(&self, camera: &Camera, segments: &[Segment]) -> Vec<PathBuf> {
        naming::planned_paths(&self.config.output_dir, &camera.display_name, segments)
    }

    fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Fetch every segment with at most `max_connections` transfers in
    /// flight. Returns exactly one result per input segment, in completion
    /// order.
    pub async fn fetch_all<C>(
        &self,
        sessions: &SessionClient<C>,
        camera: &Camera,
        segments: Vec<Segment>,
        cancel: &CancellationToken,
    ) -> Vec<DownloadResult>
    where
        C: ControllerApi + ?Sized,
    {
        let limit = self.config.max_connections.max(1);
        info!(
            camera = %camera.display_name,
            segments = segments.len(),
            concurrency = limit,
            "starting downloads"
        );
        self.emit(DownloadEvent::Planned {
            total: segments.len(),
        });

        let paths = self.target_paths(camera, &segments);
        stream::iter(segments.into_iter().zip(paths))
            .map(|(segment, path)| self.fetch_one(sessions, segment, path, cancel))
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Fetch a single segment into `path`, honouring skip rules, retries,
    /// and one re-login on session expiry.
    pub async fn fetch_one<C>(
        &self,
        sessions: &SessionClient<C>,
        segment: Segment,
        path: PathBuf,
        cancel: &CancellationToken,
    ) -> DownloadResult
    where
        C: ControllerApi + ?Sized,
    {
        if cancel.is_cancelled() {
            return self.finish(segment, DownloadStatus::Failed(FailureReason::Cancelled), None, 0, 0);
        }

        if segment.in_progress {
            debug!(segment = %segment.id, "skipping segment, still recording");
            return self.finish(
                segment,
                DownloadStatus::Skipped(SkipReason::StillRecording),
                None,
                0,
                0,
            );
        }

        if already_downloaded(&path, segment.size_hint).await {
            debug!(segment = %segment.id, path = %path.display(), "already downloaded");
            return self.finish(
                segment,
                DownloadStatus::Skipped(SkipReason::AlreadyDownloaded),
                Some(path),
                0,
                0,
            );
        }

        self.emit(DownloadEvent::Started {
            segment: segment.id.clone(),
            path: path.clone(),
            size_hint: segment.size_hint,
        });

        let mut session = match sessions.current().await {
            Ok(session) => session,
            Err(e) => {
                let reason = FailureReason::SessionLost {
                    message: e.to_string(),
                };
                return self.finish(segment, DownloadStatus::Failed(reason), None, 0, 0);
            }
        };

        let policy = self.config.retry;
        let mut attempts = 0_u32;
        let mut transient_failures = 0_u32;
        let mut relogged = false;

        let status = loop {
            attempts += 1;
            let outcome = self
                .transfer_once(sessions.api(), &session, &segment, &path, cancel)
                .await;
            let err = match outcome {
                Ok(bytes) => {
                    info!(segment = %segment.id, bytes, path = %path.display(), "downloaded");
                    return self.finish(
                        segment,
                        DownloadStatus::Success,
                        Some(path),
                        bytes,
                        attempts,
                    );
                }
                Err(err) => err,
            };

            match err {
                TransferError::Cancelled => break FailureReason::Cancelled,
                TransferError::SessionExpired if relogged => {
                    break FailureReason::SessionLost {
                        message: "session rejected again after re-login".into(),
                    };
                }
                TransferError::SessionExpired => {
                    relogged = true;
                    match sessions.refresh(session.generation).await {
                        Ok(fresh) => session = fresh,
                        Err(e) => {
                            break FailureReason::SessionLost {
                                message: e.to_string(),
                            };
                        }
                    }
                }
                TransferError::Transient(message) => {
                    transient_failures += 1;
                    if !policy.should_retry(transient_failures) {
                        break FailureReason::Transient {
                            message,
                            attempts: transient_failures,
                        };
                    }
                    let delay = policy.delay_for(transient_failures);
                    warn!(
                        segment = %segment.id,
                        attempt = transient_failures,
                        delay = ?delay,
                        error = %message,
                        "transient download failure, retrying"
                    );
                    self.emit(DownloadEvent::Retrying {
                        segment: segment.id.clone(),
                        attempt: transient_failures,
                        delay,
                        error: message,
                    });
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break FailureReason::Cancelled,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                TransferError::Permanent { status, message } => {
                    break FailureReason::Permanent { message, status };
                }
                err @ TransferError::Io { .. } => {
                    break FailureReason::Io {
                        message: err.to_string(),
                    };
                }
            }
        };

        warn!(segment = %segment.id, reason = %status, "download failed");
        self.finish(segment, DownloadStatus::Failed(status), None, 0, attempts)
    }

    /// One attempt: open, stream to the `.part` file, verify, rename.
    async fn transfer_once<C>(
        &self,
        api: &Arc<C>,
        session: &Session,
        segment: &Segment,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError>
    where
        C: ControllerApi + ?Sized,
    {
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransferError::Cancelled),
            body = api.open_segment(&session.token, segment) => body?,
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TransferError::io(dir, e))?;
        }

        let part = PartFile::new(naming::part_path(path, segment));
        let mut file = tokio::fs::File::create(part.path())
            .await
            .map_err(|e| TransferError::io(part.path(), e))?;

        let mut body_stream = body.stream;
        let mut written = 0_u64;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::Cancelled),
                next = body_stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(part.path(), e))?;

            let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
            written += len;
            self.emit(DownloadEvent::Progress {
                segment: segment.id.clone(),
                bytes: len,
            });
        }

        if let Some(expected) = body.content_length {
            if written != expected {
                return Err(TransferError::Transient(format!(
                    "body truncated: received {written} of {expected} bytes"
                )));
            }
        }

        file.sync_all()
            .await
            .map_err(|e| TransferError::io(part.path(), e))?;
        drop(file);

        tokio::fs::rename(part.path(), path)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        part.disarm();

        Ok(written)
    }

    fn finish(
        &self,
        segment: Segment,
        status: DownloadStatus,
        local_path: Option<PathBuf>,
        bytes: u64,
        attempts: u32,
    ) -> DownloadResult {
        self.emit(DownloadEvent::Finished {
            segment: segment.id.clone(),
            status: status.clone(),
            bytes,
        });
        DownloadResult {
            segment,
            status,
            local_path,
            bytes,
            attempts,
        }
    }
}

/// A final file only exists after a completed rename; it counts as done
/// when its length matches the hint, or is non-empty when there is none.
async fn already_downloaded(path: &Path, size_hint: Option<u64>) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => match size_hint {
            Some(expected) => meta.len() == expected,
            None => meta.len() > 0,
        },
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_file_matches_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");

        assert!(!already_downloaded(&path, None).await);

        std::fs::write(&path, b"").unwrap();
        assert!(!already_downloaded(&path, None).await);

        std::fs::write(&path, b"12345").unwrap();
        assert!(already_downloaded(&path, None).await);
        assert!(already_downloaded(&path, Some(5)).await);
        assert!(!already_downloaded(&path, Some(6)).await);
    }

    #[tokio::test]
    async fn directory_is_not_a_download() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!already_downloaded(dir.path(), None).await);
    }
}
