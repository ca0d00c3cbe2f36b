// ── Camera name resolution ──

use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::ControllerApi;
use crate::error::CoreError;
use crate::model::Camera;
use crate::session::SessionClient;

/// Maps a camera display name to the controller's camera.
///
/// The camera list is fetched once and cached for the resolver's
/// lifetime (one run).
#[derive(Debug, Default)]
pub struct CameraResolver {
    cameras: OnceCell<Vec<Camera>>,
}

impl CameraResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All cameras known to the controller, in controller order.
    pub async fn cameras<C>(&self, sessions: &SessionClient<C>) -> Result<&[Camera], CoreError>
    where
        C: ControllerApi + ?Sized,
    {
        let cameras = self
            .cameras
            .get_or_try_init(|| async {
                let api = sessions.api();
                let cameras = sessions
                    .authorized(|s| async move { api.list_cameras(&s.token).await })
                    .await?;
                debug!(count = cameras.len(), "fetched camera list");
                Ok::<_, CoreError>(cameras)
            })
            .await?;
        Ok(cameras)
    }

    /// Resolve `name` by exact, case-sensitive equality.
    pub async fn resolve<C>(&self, sessions: &SessionClient<C>, name: &str) -> Result<Camera, CoreError>
    where
        C: ControllerApi + ?Sized,
    {
        let cameras = self.cameras(sessions).await?;
        let camera = match_camera(cameras, name)?;
        debug!(name, id = %camera.id, "resolved camera");
        Ok(camera.clone())
    }
}

/// Pick the single camera whose display name equals `name`.
pub fn match_camera<'a>(cameras: &'a [Camera], name: &str) -> Result<&'a Camera, CoreError> {
    let mut matches = cameras.iter().filter(|c| c.display_name == name);

    let Some(first) = matches.next() else {
        let mut available: Vec<String> = cameras.iter().map(|c| c.display_name.clone()).collect();
        available.sort();
        return Err(CoreError::CameraNotFound {
            name: name.to_owned(),
            available,
        });
    };

    let rest: Vec<&Camera> = matches.collect();
    if rest.is_empty() {
        return Ok(first);
    }

    Err(CoreError::AmbiguousCameraName {
        name: name.to_owned(),
        ids: std::iter::once(first)
            .chain(rest)
            .map(|c| c.id.to_string())
            .collect(),
    })
}
