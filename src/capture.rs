//! Capture loop: batch sweeps over files and the live monitor
//!
//! Both modes drive the same cycle (sample a frame, run one detection,
//! accumulate results) but schedule it differently. A sweep walks a
//! fixed time step across the media duration sequentially; the live monitor
//! ticks on a fixed period until stopped. The loops are generic over the
//! sample/detect seams so they can be exercised without ffmpeg or network.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{DetectedObject, TimedEvent, format_timestamp};
use crate::services::alerts::{AlertClient, dispatch_alert};
use crate::services::detector::{DetectError, DetectorClient};

/// Progress of a running sweep: completed step index out of total steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepProgress {
    pub step: usize,
    pub total_steps: usize,
}

/// Walk `step_secs` increments across `duration_secs`, sequentially awaiting
/// capture and detection at each offset. A failed sample or detection is
/// logged and skipped; only an unusable duration aborts. Events are labelled
/// with the sample's offset into the media.
pub async fn run_sweep<S, SF, D, DF>(
    duration_secs: f64,
    step_secs: f64,
    mut sample: S,
    mut detect: D,
    mut progress: impl FnMut(SweepProgress),
) -> Result<Vec<TimedEvent>>
where
    S: FnMut(f64) -> SF,
    SF: Future<Output = Result<Option<String>>>,
    D: FnMut(String) -> DF,
    DF: Future<Output = Result<Vec<TimedEvent>, DetectError>>,
{
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        bail!("invalid media duration");
    }
    if step_secs <= 0.0 {
        bail!("invalid sweep step");
    }

    // The loop samples every partial step too, so the total is a ceiling;
    // progress must not report completion while a sample is still pending.
    let total_steps = (duration_secs / step_secs).ceil().max(1.0) as usize;
    let mut events = Vec::new();

    let mut step = 0usize;
    let mut offset = 0.0f64;
    while offset < duration_secs {
        progress(SweepProgress { step, total_steps });

        let label = format_timestamp(offset as u64);
        match sample(offset).await {
            Ok(Some(frame)) => match detect(frame).await {
                Ok(detected) => {
                    events.extend(detected.into_iter().map(|event| TimedEvent {
                        timestamp: label.clone(),
                        ..event
                    }));
                }
                Err(err) => {
                    eprintln!("[sweep] Detection failed at {}: {}", label, err);
                }
            },
            Ok(None) => {
                println!("[sweep] No frame at {}, skipping", label);
            }
            Err(err) => {
                eprintln!("[sweep] Capture failed at {}: {}", label, err);
            }
        }

        step += 1;
        offset += step_secs;
    }

    progress(SweepProgress {
        step: total_steps,
        total_steps,
    });

    Ok(events)
}

/// Lifecycle of a live monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Armed,
    Running,
    Cancelled,
}

/// What the live loop asks the detector for on each tick. Events accumulate;
/// objects are a rolling snapshot of the latest frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Events,
    Objects,
}

/// One detection cycle's outcome in live mode.
pub enum LiveDetection {
    Events(Vec<TimedEvent>),
    Objects(Vec<DetectedObject>),
}

struct MonitorShared {
    state: Mutex<MonitorState>,
    events: Mutex<Vec<TimedEvent>>,
    objects: Mutex<Vec<DetectedObject>>,
    transcript: Mutex<String>,
    stopped: Notify,
    started: Instant,
}

/// Handle to a live capture loop. Stopping flips the state to `Cancelled`;
/// in-flight completions consult it before touching the event list, so a
/// stale result arriving after stop is discarded. The network call already
/// in flight is not cancelled; only its result is dropped.
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<MonitorShared>,
}

impl MonitorHandle {
    pub async fn state(&self) -> MonitorState {
        *self.shared.state.lock().await
    }

    pub async fn events(&self) -> Vec<TimedEvent> {
        self.shared.events.lock().await.clone()
    }

    /// Latest object snapshot; empty unless the loop runs in object mode.
    pub async fn objects(&self) -> Vec<DetectedObject> {
        self.shared.objects.lock().await.clone()
    }

    /// Append speech-capture text; folded into subsequent detection prompts.
    pub async fn append_transcript(&self, text: &str) {
        let mut transcript = self.shared.transcript.lock().await;
        if !transcript.is_empty() {
            transcript.push(' ');
        }
        transcript.push_str(text);
    }

    /// Disarm the loop. Idempotent. Does not wait for an in-flight
    /// detection; its completion is discarded by the state check.
    pub async fn stop(&self) {
        *self.shared.state.lock().await = MonitorState::Cancelled;
        self.shared.stopped.notify_one();
    }
}

/// Start a live monitor over the configured stream source. Samples once
/// immediately, then on every `period` tick until stopped. Sampling and
/// detection run sequentially inside the task and missed ticks are skipped,
/// so an in-flight detection suppresses the next tick rather than stacking.
pub fn start_live_monitor(
    source: crate::sampler::LiveSource,
    detector: Arc<Mutex<DetectorClient>>,
    alerts: Option<AlertClient>,
    period: Duration,
    mode: MonitorMode,
) -> MonitorHandle {
    let sample = move || {
        let source = source.clone();
        async move { source.sample_now().await }
    };
    match mode {
        MonitorMode::Events => {
            let detect = move |frame: String, transcript: String| {
                let detector = detector.clone();
                async move {
                    let transcript = (!transcript.is_empty()).then_some(transcript.as_str());
                    let mut detector = detector.lock().await;
                    detector
                        .detect_events(&frame, transcript)
                        .await
                        .map(|result| LiveDetection::Events(result.events))
                }
            };
            spawn_monitor(sample, detect, alerts, period)
        }
        MonitorMode::Objects => {
            let detect = move |frame: String, _transcript: String| {
                let detector = detector.clone();
                async move {
                    let mut detector = detector.lock().await;
                    detector
                        .detect_objects(&frame)
                        .await
                        .map(|result| LiveDetection::Objects(result.objects))
                }
            };
            spawn_monitor(sample, detect, None, period)
        }
    }
}

fn spawn_monitor<S, SF, D, DF>(
    mut sample: S,
    mut detect: D,
    alerts: Option<AlertClient>,
    period: Duration,
) -> MonitorHandle
where
    S: FnMut() -> SF + Send + 'static,
    SF: Future<Output = Result<Option<String>>> + Send,
    D: FnMut(String, String) -> DF + Send + 'static,
    DF: Future<Output = Result<LiveDetection, DetectError>> + Send,
{
    let shared = Arc::new(MonitorShared {
        state: Mutex::new(MonitorState::Armed),
        events: Mutex::new(Vec::new()),
        objects: Mutex::new(Vec::new()),
        transcript: Mutex::new(String::new()),
        stopped: Notify::new(),
        started: Instant::now(),
    });

    let loop_shared = shared.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = loop_shared.stopped.notified() => break,
            }

            {
                let mut state = loop_shared.state.lock().await;
                if *state == MonitorState::Cancelled {
                    break;
                }
                *state = MonitorState::Running;
            }

            let elapsed_secs = loop_shared.started.elapsed().as_secs();
            let label = format_timestamp(elapsed_secs);

            let frame = match sample().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    println!("[monitor] No frame at {}, skipping", label);
                    continue;
                }
                Err(err) => {
                    eprintln!("[monitor] Capture failed at {}: {}", label, err);
                    continue;
                }
            };

            let transcript = loop_shared.transcript.lock().await.clone();
            match detect(frame, transcript).await {
                Ok(detected) => {
                    // Consult state before applying: a completion landing
                    // after stop() must not mutate the list.
                    let state = loop_shared.state.lock().await;
                    if *state == MonitorState::Cancelled {
                        println!("[monitor] Discarding stale result at {}", label);
                        break;
                    }
                    drop(state);

                    match detected {
                        LiveDetection::Events(detected) => {
                            let mut events = loop_shared.events.lock().await;
                            for event in detected {
                                let event = TimedEvent {
                                    timestamp: label.clone(),
                                    ..event
                                };
                                if event.is_dangerous {
                                    if let Some(alerts) = &alerts {
                                        dispatch_alert(alerts.clone(), event.clone());
                                    }
                                }
                                events.push(event);
                            }
                        }
                        LiveDetection::Objects(detected) => {
                            *loop_shared.objects.lock().await = detected;
                        }
                    }
                }
                Err(DetectError::Cooldown(wait)) => {
                    println!(
                        "[monitor] Cooldown at {}, next attempt in {:?}",
                        label, wait
                    );
                }
                Err(DetectError::Upstream(err)) => {
                    // Transport failure disarms the loop
                    eprintln!("[monitor] Upstream failure at {}, stopping: {}", label, err);
                    *loop_shared.state.lock().await = MonitorState::Cancelled;
                    break;
                }
                Err(err) => {
                    eprintln!("[monitor] Detection failed at {}: {}", label, err);
                }
            }
        }

        *loop_shared.state.lock().await = MonitorState::Cancelled;
    });

    MonitorHandle { shared }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(description: &str) -> TimedEvent {
        TimedEvent {
            timestamp: "00:00".to_string(),
            description: description.to_string(),
            is_dangerous: false,
        }
    }

    #[tokio::test]
    async fn sweep_relabels_events_with_media_offset() {
        let events = run_sweep(
            9.0,
            3.0,
            |offset| async move { Ok(Some(format!("frame@{offset}"))) },
            |frame| async move { Ok(vec![event(&frame)]) },
            |_| {},
        )
        .await
        .unwrap();

        let labels: Vec<&str> = events.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(labels, vec!["00:00", "00:03", "00:06"]);
        assert_eq!(events[1].description, "frame@3");
    }

    #[tokio::test]
    async fn sweep_skips_failed_samples_and_detections() {
        let calls = AtomicUsize::new(0);
        let events = run_sweep(
            12.0,
            3.0,
            |offset| async move {
                if offset == 3.0 {
                    anyhow::bail!("capture exploded")
                } else if offset == 6.0 {
                    Ok(None)
                } else {
                    Ok(Some("frame".to_string()))
                }
            },
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DetectError::MalformedResponse)
                    } else {
                        Ok(vec![event("late one")])
                    }
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        // offsets 0 (detect failed), 3 (capture failed), 6 (no frame), 9 (ok)
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, "00:09");
    }

    #[tokio::test]
    async fn sweep_reports_step_progress() {
        let progress = std::sync::Mutex::new(Vec::new());
        run_sweep(
            10.0,
            3.0,
            |_| async { Ok(Some("frame".to_string())) },
            |_| async { Ok(Vec::new()) },
            |p| progress.lock().unwrap().push(p),
        )
        .await
        .unwrap();

        // 10s at a 3s step runs samples at 0, 3, 6 and 9; completion is
        // reported exactly once, after the last sample.
        let progress = progress.into_inner().unwrap();
        let steps: Vec<(usize, usize)> = progress.iter().map(|p| (p.step, p.total_steps)).collect();
        assert_eq!(steps, vec![(0, 4), (1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn sweep_aborts_on_unusable_duration() {
        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = run_sweep(
                duration,
                3.0,
                |_| async { Ok(None) },
                |_| async { Ok(Vec::new()) },
                |_| {},
            )
            .await;
            assert!(result.is_err(), "duration {duration} should abort");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_appends_then_discards_after_stop() {
        let handle = spawn_monitor(
            || async { Ok(Some("frame".to_string())) },
            |_, _| async { Ok(LiveDetection::Events(vec![event("movement")])) },
            None,
            Duration::from_secs(3),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        let seen = handle.events().await.len();
        assert!(seen >= 1, "expected at least one appended event");

        handle.stop().await;
        assert_eq!(handle.state().await, MonitorState::Cancelled);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.events().await.len(), seen, "no appends after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_disarms_on_upstream_failure() {
        let handle = spawn_monitor(
            || async { Ok(Some("frame".to_string())) },
            |_, _| async {
                Err(DetectError::Upstream(
                    crate::services::inference::InferenceError::EmptyResponse,
                ))
            },
            None,
            Duration::from_secs(3),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.state().await, MonitorState::Cancelled);
        assert!(handle.events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_does_not_wait_for_an_in_flight_detection() {
        let handle = spawn_monitor(
            || async { Ok(Some("frame".to_string())) },
            |_, _| async {
                // Slow upstream call still running when stop arrives
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(LiveDetection::Events(vec![event("late arrival")]))
            },
            None,
            Duration::from_secs(3),
        );

        // First detection is in flight; stop must return without it
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await;
        assert_eq!(handle.state().await, MonitorState::Cancelled);

        // The completion lands much later and is discarded
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(handle.events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn object_mode_replaces_the_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let detect_calls = calls.clone();
        let handle = spawn_monitor(
            || async { Ok(Some("frame".to_string())) },
            move |_, _| {
                let n = detect_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(LiveDetection::Objects(vec![DetectedObject {
                        label: format!("cart-{n}"),
                        confidence: 0.9,
                        bbox: [0.1, 0.1, 0.5, 0.5],
                    }]))
                }
            },
            None,
            Duration::from_secs(2),
        );

        tokio::time::sleep(Duration::from_secs(7)).await;
        let objects = handle.objects().await;
        assert_eq!(objects.len(), 1, "snapshot replaced, not appended");
        assert!(objects[0].label.starts_with("cart-"));
        assert!(handle.events().await.is_empty());

        handle.stop().await;
    }
}
