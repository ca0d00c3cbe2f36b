// ── Pipeline orchestration ──
//
// login -> resolve camera -> list recordings -> fetch segments, strictly
// in that order. Any error before the fetch phase aborts the run with no
// download attempted; fetch-phase failures are per segment and end up in
// the summary. The session is logged out on every exit path.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use uvcdl_api::UvcClient;

use crate::api::ControllerApi;
use crate::config::{ControllerConfig, Credentials, DownloadConfig};
use crate::download::{DownloadEvent, DownloadManager};
use crate::error::CoreError;
use crate::index::RecordingIndex;
use crate::model::{Camera, PlannedSegment, RunSummary, TimeRange};
use crate::resolver::CameraResolver;
use crate::session::SessionClient;

/// What to download.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Display name, matched exactly.
    pub camera_name: String,
    pub range: TimeRange,
    /// Stop after listing and report the plan.
    pub dry_run: bool,
}

/// Composes session, resolver, index, and download manager for one run.
pub struct Pipeline<C: ?Sized> {
    sessions: SessionClient<C>,
    resolver: CameraResolver,
    index: RecordingIndex,
    downloads: DownloadManager,
}

impl Pipeline<UvcClient> {
    /// Build a pipeline against a UniFi Video controller.
    pub fn connect(controller: &ControllerConfig, download: DownloadConfig) -> Result<Self, CoreError> {
        let client = UvcClient::new(controller.url.clone(), &controller.transport())?;
        Ok(Self::new(
            Arc::new(client),
            controller.credentials.clone(),
            controller.session_ttl,
            download,
        ))
    }
}

impl<C: ControllerApi + ?Sized> Pipeline<C> {
    pub fn new(
        api: Arc<C>,
        credentials: Credentials,
        session_ttl: Option<Duration>,
        download: DownloadConfig,
    ) -> Self {
        let index = RecordingIndex::new(download.page_size, download.max_pages);
        Self {
            sessions: SessionClient::new(api, credentials, session_ttl),
            resolver: CameraResolver::new(),
            index,
            downloads: DownloadManager::new(download),
        }
    }

    pub fn sessions(&self) -> &SessionClient<C> {
        &self.sessions
    }

    /// Progress events from the download phase.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.downloads.subscribe()
    }

    /// Execute one run end to end.
    ///
    /// Returns `Err` only for run-level failures (output directory, login,
    /// camera resolution, listing, cancellation before downloads began).
    /// Per-segment failures are reported inside the summary.
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CoreError> {
        let started = Instant::now();
        prepare_output_dir(&self.downloads.config().output_dir, request.dry_run).await?;

        let result = self.execute(request, cancel, started).await;
        self.sessions.logout().await;
        result
    }

    async fn execute(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RunSummary, CoreError> {
        cancellable(cancel, self.sessions.login()).await?;

        let camera = cancellable(
            cancel,
            self.resolver.resolve(&self.sessions, &request.camera_name),
        )
        .await?;

        let segments = cancellable(
            cancel,
            self.index.list(&self.sessions, &camera.id, request.range),
        )
        .await?;

        let planned: Vec<PlannedSegment> = segments
            .iter()
            .zip(self.downloads.target_paths(&camera, &segments))
            .map(|(segment, path)| PlannedSegment {
                path,
                segment: segment.clone(),
            })
            .collect();

        let results = if request.dry_run {
            info!(segments = planned.len(), "dry run, skipping downloads");
            Vec::new()
        } else {
            self.downloads
                .fetch_all(&self.sessions, &camera, segments, cancel)
                .await
        };

        let summary = RunSummary {
            camera,
            range: request.range,
            dry_run: request.dry_run,
            planned,
            results,
            elapsed: started.elapsed(),
        };

        if summary.is_success() {
            info!(
                succeeded = summary.succeeded(),
                skipped = summary.skipped(),
                "run complete"
            );
        } else {
            warn!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                skipped = summary.skipped(),
                "run complete with failures"
            );
        }
        Ok(summary)
    }

    /// List every camera on the controller (login, fetch, logout).
    pub async fn list_cameras(&self, cancel: &CancellationToken) -> Result<Vec<Camera>, CoreError> {
        let result = async {
            cancellable(cancel, self.sessions.login()).await?;
            let cameras = cancellable(cancel, self.resolver.cameras(&self.sessions)).await?;
            Ok::<_, CoreError>(cameras.to_vec())
        }
        .await;
        self.sessions.logout().await;
        result
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        result = fut => result,
    }
}

/// Reject an output path that is not a directory; create it when missing
/// (unless this is a dry run).
async fn prepare_output_dir(path: &Path, dry_run: bool) -> Result<(), CoreError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CoreError::OutputDirectory {
            path: path.to_path_buf(),
            reason: "exists but is not a directory".into(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if dry_run {
                return Ok(());
            }
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| CoreError::OutputDirectory {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
        }
        Err(e) => Err(CoreError::OutputDirectory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
