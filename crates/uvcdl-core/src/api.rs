// ── Controller adapter seam ──
//
// Core logic talks to the controller only through `ControllerApi`, so the
// session/listing/download machinery is independent of the controller's
// API version. `uvcdl_api::UvcClient` is the production implementation;
// tests plug in in-memory fakes.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use url::Url;

use uvcdl_api::{RecordingQuery, SessionToken, UvcClient};

use crate::config::Credentials;
use crate::convert::segment_from_recording;
use crate::error::{CoreError, TransferError};
use crate::model::{Camera, CameraId, Segment, TimeRange};

/// A boxed stream of segment body chunks.
pub type SegmentStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransferError>> + Send>>;

/// An open segment transfer.
pub struct SegmentBody {
    /// Declared body length, if the controller sent one.
    pub content_length: Option<u64>,
    pub stream: SegmentStream,
}

impl std::fmt::Debug for SegmentBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// One page request against the recording listing.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub camera_id: CameraId,
    pub range: TimeRange,
    pub offset: u64,
    pub limit: u64,
}

/// One page of the recording listing, unfiltered.
#[derive(Debug, Clone, Default)]
pub struct SegmentPage {
    pub segments: Vec<Segment>,
    /// Total matches across all pages, when the controller reports it.
    pub total_count: Option<u64>,
}

/// Everything the core needs from a controller.
///
/// Every call takes the session token explicitly; implementations hold no
/// session state.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Controller root URL, for session bookkeeping and diagnostics.
    fn base_url(&self) -> &Url;

    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, CoreError>;

    async fn logout(&self, token: &SessionToken) -> Result<(), CoreError>;

    async fn list_cameras(&self, token: &SessionToken) -> Result<Vec<Camera>, CoreError>;

    async fn list_recordings_page(
        &self,
        token: &SessionToken,
        request: &PageRequest,
    ) -> Result<SegmentPage, CoreError>;

    async fn open_segment(
        &self,
        token: &SessionToken,
        segment: &Segment,
    ) -> Result<SegmentBody, TransferError>;
}

// ── UniFi Video 2.0 implementation ──────────────────────────────────

#[async_trait]
impl ControllerApi for UvcClient {
    fn base_url(&self) -> &Url {
        UvcClient::base_url(self)
    }

    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, CoreError> {
        UvcClient::login(self, &credentials.username, &credentials.password)
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::ConnectionFailed { url, reason } if url.is_empty() => {
                    CoreError::ConnectionFailed {
                        url: UvcClient::base_url(self).to_string(),
                        reason,
                    }
                }
                other => other,
            })
    }

    async fn logout(&self, token: &SessionToken) -> Result<(), CoreError> {
        UvcClient::logout(self, token).await.map_err(CoreError::from)
    }

    async fn list_cameras(&self, token: &SessionToken) -> Result<Vec<Camera>, CoreError> {
        let cameras = UvcClient::list_cameras(self, token).await?;
        Ok(cameras.into_iter().map(Camera::from).collect())
    }

    async fn list_recordings_page(
        &self,
        token: &SessionToken,
        request: &PageRequest,
    ) -> Result<SegmentPage, CoreError> {
        let query = RecordingQuery {
            camera_id: request.camera_id.as_str(),
            start_ms: request.range.start_ms(),
            end_ms: request.range.end_ms(),
            offset: request.offset,
            limit: request.limit,
        };
        let page = self.list_recordings(token, &query).await?;

        let segments = page
            .recordings
            .into_iter()
            .map(|r| {
                let id = r.id.clone();
                segment_from_recording(&request.camera_id, r).ok_or_else(|| CoreError::Query {
                    message: format!("recording {id} has invalid start/end times"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SegmentPage {
            segments,
            total_count: page.total_count,
        })
    }

    async fn open_segment(
        &self,
        token: &SessionToken,
        segment: &Segment,
    ) -> Result<SegmentBody, TransferError> {
        let download = self.download_recording(token, segment.id.as_str()).await?;
        Ok(SegmentBody {
            content_length: download.content_length,
            stream: Box::pin(download.body.map_err(TransferError::from)),
        })
    }
}
