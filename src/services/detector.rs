//! Event and object detection against the inference endpoint
//!
//! One detection = one frame payload sent upstream, one loosely-structured
//! text response coerced into events or objects. The client owns its backoff
//! state; construct one per independent caller.

use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::constants::{DETECT_BASELINE_COOLDOWN_MS, MAX_QUOTA_FAILURES};
use crate::extract::{self, ExtractedJson};
use crate::models::{DetectedObject, DetectionResult, ObjectDetectionResult, TimedEvent};
use crate::services::inference::{InferenceClient, InferenceError};
use crate::services::rate_limit::CallGate;

/// Errors surfaced by one detection call.
#[derive(Debug)]
pub enum DetectError {
    /// No image data was provided at all
    EmptyImage,
    /// Payload has no embedded base64 data segment
    MalformedImage,
    /// The backoff window has not elapsed; advisory, do not spin-retry
    Cooldown(Duration),
    /// Response text contained no parseable JSON object
    MalformedResponse,
    /// Transport or upstream failure
    Upstream(InferenceError),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::EmptyImage => write!(f, "no image data provided"),
            DetectError::MalformedImage => write!(f, "invalid image data format"),
            DetectError::Cooldown(wait) => write!(
                f,
                "rate limit exceeded, please wait {} seconds",
                wait.as_secs_f64().ceil() as u64
            ),
            DetectError::MalformedResponse => write!(f, "failed to parse detection response"),
            DetectError::Upstream(err) => write!(f, "inference call failed: {err}"),
        }
    }
}

impl std::error::Error for DetectError {}

const EVENTS_PROMPT_HEADER: &str =
    "Please analyze this frame and describe any significant events or actions occurring.";

const EVENTS_PROMPT_FOOTER: &str = r#"Return a JSON object in this exact format:

{
    "events": [
        {
            "timestamp": "mm:ss",
            "description": "Brief description of what's happening in this frame",
            "isDangerous": false
        }
    ]
}

Set "isDangerous" to true only for events that warrant a security alert.
If nothing significant is happening, return {"events": []}.
Be concise but descriptive.
DO NOT include any text outside the JSON."#;

const OBJECTS_PROMPT: &str = r#"Detect the distinct objects visible in this frame. Return a JSON object in this exact format:

{
    "objects": [
        {
            "label": "object name",
            "confidence": 0.0,
            "bbox": [x_min, y_min, x_max, y_max]
        }
    ]
}

All bbox coordinates must be normalized to the range 0 to 1.
If no objects are visible, return {"objects": []}.
DO NOT include any text outside the JSON."#;

/// Detection client. Owns a cooldown gate so repeated quota failures widen
/// the spacing between calls.
#[derive(Debug, Clone)]
pub struct DetectorClient {
    inference: InferenceClient,
    gate: CallGate,
}

impl DetectorClient {
    pub fn new(inference: InferenceClient) -> Self {
        Self {
            inference,
            gate: CallGate::new(
                Duration::from_millis(DETECT_BASELINE_COOLDOWN_MS),
                MAX_QUOTA_FAILURES,
            ),
        }
    }

    /// Analyze one frame for significant events, optionally folding in the
    /// accumulated audio transcript.
    pub async fn detect_events(
        &mut self,
        image_payload: &str,
        transcript: Option<&str>,
    ) -> Result<DetectionResult, DetectError> {
        let prompt = build_events_prompt(transcript);
        let raw = self.call_upstream(&prompt, image_payload).await?;
        let events = parse_event_response(&raw)?;
        Ok(DetectionResult {
            events,
            raw_response: raw,
        })
    }

    /// Analyze one frame for labelled objects with bounding boxes.
    pub async fn detect_objects(
        &mut self,
        image_payload: &str,
    ) -> Result<ObjectDetectionResult, DetectError> {
        let raw = self.call_upstream(OBJECTS_PROMPT, image_payload).await?;
        let objects = parse_object_response(&raw)?;
        Ok(ObjectDetectionResult {
            objects,
            raw_response: raw,
        })
    }

    async fn call_upstream(
        &mut self,
        prompt: &str,
        image_payload: &str,
    ) -> Result<String, DetectError> {
        let base64_data = base64_segment(image_payload)?;

        let now = Instant::now();
        self.gate.check_ready(now).map_err(DetectError::Cooldown)?;
        self.gate.mark_attempt(now);

        match self
            .inference
            .describe_image(prompt, base64_data, "image/jpeg")
            .await
        {
            Ok(text) => {
                self.gate.record_success();
                Ok(text)
            }
            Err(err) if err.is_quota() => {
                self.gate.record_quota_failure();
                eprintln!(
                    "[detect] Quota error, backing off for {:?}: {}",
                    self.gate.backoff_window(),
                    err
                );
                Err(DetectError::Cooldown(self.gate.backoff_window()))
            }
            Err(err) => Err(DetectError::Upstream(err)),
        }
    }
}

fn build_events_prompt(transcript: Option<&str>) -> String {
    match transcript.map(str::trim).filter(|t| !t.is_empty()) {
        Some(transcript) => format!(
            "{}\nConsider this audio transcript from the scene: \"{}\"\n{}",
            EVENTS_PROMPT_HEADER, transcript, EVENTS_PROMPT_FOOTER
        ),
        None => format!("{}\n{}", EVENTS_PROMPT_HEADER, EVENTS_PROMPT_FOOTER),
    }
}

/// Pull the base64 segment out of a data-URI payload.
fn base64_segment(payload: &str) -> Result<&str, DetectError> {
    if payload.is_empty() {
        return Err(DetectError::EmptyImage);
    }
    let (_, data) = payload.split_once(',').ok_or(DetectError::MalformedImage)?;
    if data.is_empty() {
        return Err(DetectError::MalformedImage);
    }
    Ok(data)
}

/// Coerce response text into an ordered event list. No locatable JSON fails
/// the call; a parsed object without an `events` array is "nothing found".
fn parse_event_response(text: &str) -> Result<Vec<TimedEvent>, DetectError> {
    let value = parse_response_object(text)?;
    let Some(events) = value.get("events").filter(|v| v.is_array()) else {
        return Ok(Vec::new());
    };
    match serde_json::from_value::<Vec<TimedEvent>>(events.clone()) {
        Ok(events) => Ok(events),
        Err(err) => {
            eprintln!("[detect] Events array had unexpected shape, treating as empty: {err}");
            Ok(Vec::new())
        }
    }
}

/// Coerce response text into validated object candidates. Candidates failing
/// validation are dropped, not surfaced as partial errors.
fn parse_object_response(text: &str) -> Result<Vec<DetectedObject>, DetectError> {
    let value = parse_response_object(text)?;
    let Some(candidates) = value.get("objects").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let objects = candidates
        .iter()
        .filter_map(|candidate| match validate_object(candidate) {
            Some(object) => Some(object),
            None => {
                eprintln!("[detect] Dropping invalid object candidate: {candidate}");
                None
            }
        })
        .collect();

    Ok(objects)
}

fn parse_response_object(text: &str) -> Result<Value, DetectError> {
    match extract::extract_json(text) {
        ExtractedJson::Parsed(value) => Ok(value),
        ExtractedJson::NoJsonFound => Err(DetectError::MalformedResponse),
        ExtractedJson::InvalidJson(err) => {
            eprintln!("[detect] Response JSON failed to parse: {err}");
            Err(DetectError::MalformedResponse)
        }
    }
}

/// A candidate needs a non-empty label, a numeric confidence, and exactly
/// four bbox coordinates coercible to numbers in [0,1].
fn validate_object(candidate: &Value) -> Option<DetectedObject> {
    let label = candidate.get("label")?.as_str()?;
    if label.is_empty() {
        return None;
    }

    let confidence = candidate.get("confidence")?.as_f64()?;

    let bbox_values = candidate.get("bbox")?.as_array()?;
    if bbox_values.len() != 4 {
        return None;
    }

    let mut bbox = [0.0f64; 4];
    for (slot, value) in bbox.iter_mut().zip(bbox_values) {
        let coord = coerce_coordinate(value)?;
        if !(0.0..=1.0).contains(&coord) {
            return None;
        }
        *slot = coord;
    }

    Some(DetectedObject {
        label: label.to_string(),
        confidence,
        bbox,
    })
}

/// Numbers pass through; numeric strings are parsed. Anything else is out.
fn coerce_coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
