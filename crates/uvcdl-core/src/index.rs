// ── Recording index ──
//
// Pages through the controller's recording listing and reduces the pages
// to the ordered, de-duplicated set of segments overlapping a range.
// Pagination is a lazy finite stream: it ends on an empty page, on the
// reported total, or (without a total) on a short page, and a hard page
// bound turns a runaway server into a query error.

use std::collections::HashSet;

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use tracing::{debug, info};

use crate::api::{ControllerApi, PageRequest, SegmentPage};
use crate::config::DownloadConfig;
use crate::error::CoreError;
use crate::model::{CameraId, Segment, TimeRange};
use crate::session::SessionClient;

#[derive(Debug, Clone, Copy)]
pub struct RecordingIndex {
    page_size: u64,
    max_pages: u64,
}

impl Default for RecordingIndex {
    fn default() -> Self {
        Self::new(DownloadConfig::DEFAULT_PAGE_SIZE, DownloadConfig::DEFAULT_MAX_PAGES)
    }
}

impl RecordingIndex {
    pub fn new(page_size: u64, max_pages: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Raw listing pages for `camera_id` within `range`, in request order.
    ///
    /// Any failed page ends the stream with that error.
    pub fn pages<'a, C>(
        &'a self,
        sessions: &'a SessionClient<C>,
        camera_id: &'a CameraId,
        range: TimeRange,
    ) -> impl Stream<Item = Result<SegmentPage, CoreError>> + 'a
    where
        C: ControllerApi + ?Sized,
    {
        try_stream! {
            let api = sessions.api();
            let mut offset = 0_u64;
            let mut fetched = 0_u64;

            loop {
                if fetched == self.max_pages {
                    Err::<(), _>(CoreError::Query {
                        message: format!(
                            "recording listing did not end after {} pages",
                            self.max_pages
                        ),
                    })?;
                }

                let request = PageRequest {
                    camera_id: camera_id.clone(),
                    range,
                    offset,
                    limit: self.page_size,
                };
                let request = &request;
                let page = sessions
                    .authorized(|s| async move { api.list_recordings_page(&s.token, request).await })
                    .await?;

                fetched += 1;
                let received = u64::try_from(page.segments.len()).unwrap_or(u64::MAX);
                offset += received;

                let exhausted = received == 0
                    || match page.total_count {
                        Some(total) => offset >= total,
                        None => received < self.page_size,
                    };
                debug!(page = fetched, received, offset, total = ?page.total_count, "listing page");

                yield page;

                if exhausted {
                    break;
                }
            }
        }
    }

    /// Every segment strictly overlapping `range`, de-duplicated by id
    /// (first occurrence wins) and sorted by `(start, id)`.
    ///
    /// All-or-nothing: a failed page discards everything fetched so far.
    pub async fn list<C>(
        &self,
        sessions: &SessionClient<C>,
        camera_id: &CameraId,
        range: TimeRange,
    ) -> Result<Vec<Segment>, CoreError>
    where
        C: ControllerApi + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        let pages = self.pages(sessions, camera_id, range);
        futures_util::pin_mut!(pages);

        while let Some(page) = pages.try_next().await? {
            for segment in page.segments {
                if range.strictly_overlaps(segment.start, segment.end)
                    && seen.insert(segment.id.clone())
                {
                    segments.push(segment);
                }
            }
        }

        segments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        info!(
            camera = %camera_id,
            count = segments.len(),
            "listed recordings"
        );
        Ok(segments)
    }
}
