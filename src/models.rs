//! Shared data models used across modules

use serde::{Deserialize, Serialize};

/// One detected moment in a piece of media. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Strict "mm:ss" label; clients seek by parsing this back
    pub timestamp: String,
    pub description: String,
    #[serde(default, rename = "isDangerous")]
    pub is_dangerous: bool,
}

/// A session the user explicitly saved. Lives in the session collection
/// until the collection file is cleared by hand; there is no in-app delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: String,
    pub name: String,
    #[serde(rename = "mediaReference")]
    pub media_reference: String,
    #[serde(rename = "thumbnailReference")]
    pub thumbnail_reference: String,
    pub timestamps: Vec<TimedEvent>,
}

/// Result of one event-detection call. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub events: Vec<TimedEvent>,
    #[serde(rename = "rawResponse")]
    pub raw_response: String,
}

/// Result of one object-detection call. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDetectionResult {
    pub objects: Vec<DetectedObject>,
    #[serde(rename = "rawResponse")]
    pub raw_response: String,
}

/// A validated object-detection candidate. Coordinates are normalized to
/// [0,1]; anything that failed validation was dropped before this exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedObject {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

/// Format whole seconds as "mm:ss".
pub fn format_timestamp(total_secs: u64) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

/// Parse an "mm:ss" label back into whole seconds.
pub fn parse_timestamp(label: &str) -> Option<u64> {
    let (minutes, seconds) = label.split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some(minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats_minutes_and_seconds() {
        assert_eq!(format_timestamp(0), "00:00");
        assert_eq!(format_timestamp(125), "02:05");
        assert_eq!(format_timestamp(3599), "59:59");
        assert_eq!(format_timestamp(5999), "99:59");
    }

    #[test]
    fn timestamp_round_trips_under_6000() {
        for secs in 0..6000u64 {
            let label = format_timestamp(secs);
            assert_eq!(parse_timestamp(&label), Some(secs), "label {}", label);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_timestamp("0205"), None);
        assert_eq!(parse_timestamp("ab:cd"), None);
        assert_eq!(parse_timestamp("01:75"), None);
    }

    #[test]
    fn timed_event_danger_flag_defaults_false() {
        let event: TimedEvent =
            serde_json::from_str(r#"{"timestamp":"00:10","description":"idle"}"#).unwrap();
        assert!(!event.is_dangerous);

        let flagged: TimedEvent = serde_json::from_str(
            r#"{"timestamp":"00:10","description":"fall","isDangerous":true}"#,
        )
        .unwrap();
        assert!(flagged.is_dangerous);
    }
}
