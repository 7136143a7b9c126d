//! Frame sampling from video files and live streams
//!
//! Rasterizes one frame at a time offset into a quality-80 JPEG data URI.
//! ffmpeg/ffprobe do the media work; the `image` crate guards against
//! handing a corrupt or zero-dimension frame to the detector. A frame that
//! fails the decode check yields no sample rather than a bad payload.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use base64::Engine;
use image::ImageReader;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use tokio::process::Command;

use crate::constants::FRAME_JPEG_QUALITY;

/// A local media file that supports seek-accurate sampling.
#[derive(Debug, Clone)]
pub struct VideoFileSource {
    path: PathBuf,
}

impl VideoFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Media duration in seconds via ffprobe. Failing to determine a usable
    /// duration is unrecoverable for a sweep, so this errors instead of
    /// guessing.
    pub async fn probe_duration(&self) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(&self.path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .context("failed to run ffprobe")?;

        let duration = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .ok();

        match duration {
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
            _ => bail!("could not determine media duration"),
        }
    }

    /// Sample the frame at `offset_secs`. `None` means the capture failed
    /// (offset past the end, undecodable frame); there is no retry.
    pub async fn sample_at(&self, offset_secs: f64) -> Result<Option<String>> {
        grab_frame(&self.path, Some(offset_secs)).await
    }
}

/// A live stream URL sampled at "current" time; no seeking.
#[derive(Debug, Clone)]
pub struct LiveSource {
    url: String,
}

impl LiveSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub async fn sample_now(&self) -> Result<Option<String>> {
        grab_frame(Path::new(&self.url), None).await
    }
}

/// Grab one frame with ffmpeg and re-encode it as a JPEG data URI.
async fn grab_frame(input: &Path, seek_secs: Option<f64>) -> Result<Option<String>> {
    let temp_dir = std::env::temp_dir().join(format!("omniguard_frame_{}", rand::random::<u64>()));
    tokio::fs::create_dir_all(&temp_dir)
        .await
        .context("failed to create frame temp dir")?;
    let frame_path = temp_dir.join("frame.jpg");

    let mut command = Command::new("ffmpeg");
    command.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
    if let Some(offset) = seek_secs {
        command.args(["-ss", &format!("{:.3}", offset)]);
    }
    command
        .arg("-i")
        .arg(input)
        .args(["-frames:v", "1"])
        .args(["-q:v", "2"])
        .arg("-y")
        .arg(&frame_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = command.output().await.context("failed to run ffmpeg")?;

    let result = if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        eprintln!(
            "[sampler] ffmpeg failed for {}: {}",
            input.display(),
            stderr.trim()
        );
        Ok(None)
    } else {
        match tokio::fs::read(&frame_path).await {
            Ok(bytes) => Ok(frame_data_uri(&bytes)),
            // ffmpeg exits zero but writes nothing when the seek lands past
            // the last frame
            Err(_) => Ok(None),
        }
    };

    let _ = tokio::fs::remove_dir_all(&temp_dir).await;
    result
}

/// Decode-check raw frame bytes and re-encode as a quality-80 JPEG data URI.
/// Returns `None` for undecodable or zero-dimension frames.
fn frame_data_uri(bytes: &[u8]) -> Option<String> {
    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return None;
    }

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, FRAME_JPEG_QUALITY);
    decoded.write_with_encoder(encoder).ok()?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    Some(format!("data:image/jpeg;base64,{}", b64))
}
