// Recording endpoints
//
// `GET /api/2.0/recording` is the paginated search;
// `recording/{id}/download` streams the video.

use tracing::debug;

use crate::auth::SessionToken;
use crate::client::{RecordingDownload, UvcClient};
use crate::error::Error;
use crate::models::{RecordingPage, RecordingQuery, UvcRecording};

/// Recording causes included in every search.
const CAUSES: [&str; 2] = ["fullTimeRecording", "motionRecording"];

impl UvcClient {
    /// Fetch one page of recordings for a camera and time window.
    ///
    /// ```text
    /// GET /api/2.0/recording?cause[]=fullTimeRecording&cause[]=motionRecording
    ///     &cameras[]={id}&startTime={ms}&endTime={ms}&sortBy=startTime&sort=asc
    ///     &idsOnly=false&offset={offset}&limit={limit}
    /// ```
    pub async fn list_recordings(
        &self,
        session: &SessionToken,
        query: &RecordingQuery<'_>,
    ) -> Result<RecordingPage, Error> {
        let url = self.api_url("recording")?;

        let mut params: Vec<(&str, String)> =
            CAUSES.iter().map(|c| ("cause[]", (*c).to_owned())).collect();
        params.extend([
            ("cameras[]", query.camera_id.to_owned()),
            ("startTime", query.start_ms.to_string()),
            ("endTime", query.end_ms.to_string()),
            ("sortBy", "startTime".to_owned()),
            ("sort", "asc".to_owned()),
            ("idsOnly", "false".to_owned()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
        ]);

        let envelope = self.get::<UvcRecording>(url, session, &params, &[]).await?;

        debug!(
            offset = query.offset,
            received = envelope.data.len(),
            total = ?envelope.meta.filtered_count.or(envelope.meta.total_count),
            "fetched recording page"
        );

        Ok(RecordingPage {
            recordings: envelope.data,
            total_count: envelope.meta.filtered_count.or(envelope.meta.total_count),
        })
    }

    /// Open the video byte stream of a recording.
    ///
    /// `GET /api/2.0/recording/{id}/download`
    pub async fn download_recording(
        &self,
        session: &SessionToken,
        id: &str,
    ) -> Result<RecordingDownload, Error> {
        let url = self.api_url(&format!("recording/{id}/download"))?;
        self.get_stream(url, session, &[("cameras.isManagedFilterOn", "false")])
            .await
    }
}
