// uvcdl-core: Authenticated, time-bounded, concurrent recording downloads.

pub mod api;
pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod index;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::{ControllerApi, PageRequest, SegmentBody, SegmentPage, SegmentStream};
pub use config::{ControllerConfig, Credentials, DownloadConfig, TlsVerification};
pub use download::{DownloadEvent, DownloadManager};
pub use error::{CoreError, TransferError};
pub use index::RecordingIndex;
pub use pipeline::{Pipeline, RunRequest};
pub use resolver::CameraResolver;
pub use retry::RetryPolicy;
pub use session::{Session, SessionClient};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Camera, CameraId, DownloadResult, DownloadStatus, FailureReason, PlannedSegment,
    RecordingCause, RunSummary, Segment, SegmentId, SkipReason, TimeRange,
};

// The session credential type is shared with the HTTP adapter.
pub use uvcdl_api::SessionToken;
