// UniFi Video API response types
//
// Every 2.0 endpoint wraps its payload as `{ "data": [...], "meta": {...} }`.
// Fields use `#[serde(default)]` liberally because firmware versions
// disagree about which keys are present.

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard response envelope.
///
/// ```json
/// { "data": [...], "meta": { "totalCount": 42, "count": 25 } }
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Meta,
}

/// Envelope metadata. Listing endpoints report the total match count here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub filtered_count: Option<u64>,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    pub username: String,
}

// ── Cameras ──────────────────────────────────────────────────────────

/// `data[0]` of `GET /api/2.0/bootstrap`.
///
/// The bootstrap document describes the whole NVR; only the camera list
/// is modelled, everything else lands in `extra`.
#[derive(Debug, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub cameras: Vec<UvcCamera>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A camera as listed in the bootstrap document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UvcCamera {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device_settings: Option<DeviceSettings>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub last_recording_id: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_recording_start_time: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UvcCamera {
    /// The user-facing camera name. `deviceSettings.name` is what the web
    /// UI shows; the top-level `name` is the fallback on older firmware.
    pub fn display_name(&self) -> Option<&str> {
        self.device_settings
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub name: Option<String>,
}

// ── Recordings ───────────────────────────────────────────────────────

/// A recording (video segment) from `GET /api/2.0/recording`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UvcRecording {
    #[serde(rename = "_id")]
    pub id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds. Null or absent while the clip is still being
    /// written.
    #[serde(default)]
    pub end_time: Option<i64>,
    /// `"fullTimeRecording"` or `"motionRecording"`.
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default)]
    pub locked: bool,
    /// Camera ids this recording belongs to (normally exactly one).
    #[serde(default)]
    pub cameras: Vec<String>,
    #[serde(default)]
    pub meta: Option<RecordingMeta>,
    /// File size in bytes, when the controller reports it.
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMeta {
    #[serde(default)]
    pub camera_name: Option<String>,
    #[serde(default)]
    pub recording_path_id: Option<String>,
}

/// Parameters for one page of `GET /api/2.0/recording`.
#[derive(Debug, Clone)]
pub struct RecordingQuery<'a> {
    pub camera_id: &'a str,
    /// Epoch milliseconds, inclusive lower bound sent to the controller.
    pub start_ms: i64,
    /// Epoch milliseconds, upper bound sent to the controller.
    pub end_ms: i64,
    pub offset: u64,
    pub limit: u64,
}

/// One page of recordings plus the server's total match count, if given.
#[derive(Debug, Clone)]
pub struct RecordingPage {
    pub recordings: Vec<UvcRecording>,
    pub total_count: Option<u64>,
}
