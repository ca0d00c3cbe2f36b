// uvcdl-api: Async Rust client for the UniFi Video controller API (v2.0)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

mod cameras;
mod recordings;

pub use auth::{SESSION_COOKIE, SessionToken};
pub use client::{ByteStream, RecordingDownload, UvcClient};
pub use error::Error;
pub use models::{RecordingPage, RecordingQuery, UvcCamera, UvcRecording};
pub use transport::{TlsMode, TransportConfig};
