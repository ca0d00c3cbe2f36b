// Camera listing
//
// UniFi Video has no lightweight "list cameras" call that includes the
// names the web UI shows; the bootstrap document carries them. The
// `cameras.isManagedFilterOn=false` cookie makes the controller include
// cameras that are not (yet) managed.

use tracing::debug;

use crate::auth::SessionToken;
use crate::client::UvcClient;
use crate::error::Error;
use crate::models::{Bootstrap, UvcCamera};

const MANAGED_FILTER_COOKIE: (&str, &str) = ("cameras.isManagedFilterOn", "false");

impl UvcClient {
    /// Fetch the bootstrap document. `GET /api/2.0/bootstrap`
    pub async fn bootstrap(&self, session: &SessionToken) -> Result<Bootstrap, Error> {
        let url = self.api_url("bootstrap")?;
        let envelope = self
            .get::<Bootstrap>(url, session, &[], &[MANAGED_FILTER_COOKIE])
            .await?;

        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnexpectedResponse("bootstrap returned no data".into()))
    }

    /// List every camera known to the controller, in controller order.
    pub async fn list_cameras(&self, session: &SessionToken) -> Result<Vec<UvcCamera>, Error> {
        let cameras = self.bootstrap(session).await?.cameras;
        debug!(count = cameras.len(), "listed cameras");
        Ok(cameras)
    }
}
