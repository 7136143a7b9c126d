//! Application constants

/// Minimum spacing between detection calls (baseline backoff window)
pub const DETECT_BASELINE_COOLDOWN_MS: u64 = 1000;

/// Consecutive quota failures before the backoff window starts doubling
pub const MAX_QUOTA_FAILURES: u32 = 5;

/// Live event-detection sampling period in seconds
pub const LIVE_INTERVAL_SECS: u64 = 3;

/// Live object-detection sampling period in seconds
pub const OBJECT_INTERVAL_SECS: u64 = 2;

/// Default batch-sweep time step in seconds
pub const SWEEP_STEP_SECS: f64 = 3.0;

/// JPEG encode quality for sampled frames (0.8)
pub const FRAME_JPEG_QUALITY: u8 = 80;

/// Maximum upload size for analyzed videos (200 MB)
pub const MAX_VIDEO_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// File name of the saved-session collection
pub const SESSIONS_FILE: &str = "saved_sessions.json";

/// Trend bucket width for the statistics page, in minutes
pub const TREND_BUCKET_MINUTES: u32 = 15;
