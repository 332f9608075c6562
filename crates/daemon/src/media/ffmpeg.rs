use async_trait::async_trait;
use engine::visual::Frame;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::preprocess::sampler::FrameSource;

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Parse an ffprobe rational such as "30000/1001". Zero rates count as absent.
fn parse_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

impl ProbeOutput {
    fn into_media_info(self) -> CoreResult<MediaInfo> {
        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| CoreError::SourceUnreadable("no video stream".to_string()))?;

        let frame_rate = video
            .r_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| video.avg_frame_rate.as_deref().and_then(parse_rate))
            .ok_or_else(|| CoreError::SourceUnreadable("frame rate not available".to_string()))?;

        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(CoreError::SourceUnreadable(
                    "video stream has no dimensions".to_string(),
                ))
            }
        };

        let duration_seconds = self
            .format
            .and_then(|f| f.duration)
            .or_else(|| video.duration.clone())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| CoreError::SourceUnreadable("duration not available".to_string()))?;

        let has_audio = self
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        Ok(MediaInfo {
            duration_seconds,
            frame_rate,
            width,
            height,
            has_audio,
        })
    }
}

/// Output size for sampled frames: `max_width` wide at most, aspect kept,
/// both sides even as rgb24 scaling requires.
pub fn sample_dimensions(info: &MediaInfo, max_width: u32) -> (u32, u32) {
    let width = info.width.min(max_width).max(2) & !1;
    let height = ((info.height as f64 * width as f64 / info.width as f64).round() as u32).max(2) & !1;
    (width, height)
}

pub struct FFmpegWrapper;

impl FFmpegWrapper {
    pub async fn probe(media_path: &Path) -> CoreResult<MediaInfo> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,width,height,r_frame_rate,avg_frame_rate,duration",
                "-of",
                "json",
            ])
            .arg(media_path)
            .output()
            .await
            .map_err(|e| {
                CoreError::SourceUnreadable(format!(
                    "failed to execute ffprobe, make sure FFmpeg is installed: {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::SourceUnreadable(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            CoreError::SourceUnreadable(format!("failed to parse ffprobe output: {e}"))
        })?;
        let info = probe.into_media_info()?;
        debug!(path = %media_path.display(), ?info, "probed media");
        Ok(info)
    }

    /// Start decoding `media_path` to raw RGB frames of the given size.
    pub fn open_frames(
        media_path: &Path,
        frame_rate: f64,
        width: u32,
        height: u32,
    ) -> CoreResult<FFmpegFrameReader> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(media_path)
            .args(["-an", "-vf"])
            .arg(format!("scale={width}:{height}"))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::SourceUnreadable(format!("failed to execute ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::SourceUnreadable("ffmpeg stdout unavailable".to_string()))?;

        Ok(FFmpegFrameReader {
            child,
            stdout,
            frame_rate,
            width,
            height,
            frames_read: 0,
        })
    }

    /// Extract the audio track as 16 kHz mono PCM WAV for transcription.
    pub async fn extract_audio(input_path: &Path, output_path: &Path) -> CoreResult<()> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Internal(format!("creating {}: {e}", parent.display())))?;
        }

        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(input_path)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
            .arg(output_path)
            .output()
            .await
            .map_err(|e| CoreError::SourceUnreadable(format!("failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(CoreError::SourceUnreadable(format!(
                "ffmpeg failed to extract audio: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Sequential reader over an ffmpeg rawvideo pipe. The child is killed when
/// the reader is dropped.
pub struct FFmpegFrameReader {
    child: Child,
    stdout: ChildStdout,
    frame_rate: f64,
    width: u32,
    height: u32,
    frames_read: u64,
}

#[async_trait]
impl FrameSource for FFmpegFrameReader {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    async fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
        let mut data = vec![0u8; Frame::byte_len(self.width, self.height)];
        let mut filled = 0;
        while filled < data.len() {
            let n = self
                .stdout
                .read(&mut data[filled..])
                .await
                .map_err(|e| CoreError::SourceUnreadable(format!("reading decoded frames: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            let status = self
                .child
                .wait()
                .await
                .map_err(|e| CoreError::Internal(format!("waiting on ffmpeg: {e}")))?;
            if !status.success() && self.frames_read == 0 {
                return Err(CoreError::SourceUnreadable(format!(
                    "ffmpeg could not decode the source ({status})"
                )));
            }
            return Ok(None);
        }
        if filled < data.len() {
            // truncated trailing frame
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Frame::from_rgb(self.width, self.height, data))
    }
}
