//! Camera listing.

use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use uvcdl_core::{Camera, DownloadConfig, Pipeline};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CameraRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Last Recording")]
    last_recording: String,
}

impl From<&Camera> for CameraRow {
    fn from(c: &Camera) -> Self {
        Self {
            name: c.display_name.clone(),
            id: c.id.to_string(),
            host: c.host.clone().unwrap_or_else(|| "-".into()),
            last_recording: c
                .last_recording_start
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = uvcdl_config::load_config()?;
    let (profile_name, controller) = config::controller_config(global, &cfg)?;
    let pipeline = Pipeline::connect(&controller, DownloadConfig::default())?;

    let cancel = CancellationToken::new();
    let interrupt = super::cancel_on_interrupt(cancel.clone());
    let result = pipeline.list_cameras(&cancel).await;
    interrupt.abort();

    let mut cameras = result.map_err(|e| CliError::from(e).for_profile(&profile_name))?;
    cameras.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    let out = output::render_list(global.format, &cameras, |c: &Camera| CameraRow::from(c), |c| {
        c.display_name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
