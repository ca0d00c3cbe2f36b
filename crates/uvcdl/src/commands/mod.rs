//! Command handlers: bridge CLI args -> core pipeline -> output formatting.

pub mod cameras;
pub mod config_cmd;
pub mod download;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Download(args) => download::handle(args, global).await,
        Command::Cameras => cameras::handle(global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}

/// Cancel `cancel` on Ctrl-C. Abort the returned handle once the run ends.
pub fn cancel_on_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    })
}
