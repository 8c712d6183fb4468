//! Video file decoding through the `ffprobe` and `ffmpeg` command-line tools.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, VideoError};
use crate::video::clip::{Clip, FrameSource};
use crate::video::types::Frame;

/// Stream properties reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// True when `tool -version` runs successfully
pub fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Read the first video stream's properties from `path`
pub fn read_video_metadata<P: AsRef<Path>>(path: P) -> Result<VideoMetadata> {
    let path = path.as_ref();
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|_| VideoError::LoadFailed {
            path: format!("{}: ffprobe failed", path.display()),
        })?;

    if !output.status.success() {
        return Err(VideoError::LoadFailed {
            path: format!("{}: not a readable video", path.display()),
        }
        .into());
    }

    parse_ffprobe_json(&output.stdout).map_err(|reason| {
        VideoError::LoadFailed {
            path: format!("{}: {}", path.display(), reason),
        }
        .into()
    })
}

fn parse_ffprobe_json(json: &[u8]) -> std::result::Result<VideoMetadata, String> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| "no video stream found".to_string())?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(format!("invalid frame size {}x{}", width, height));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| "missing frame rate".to_string())?;

    let duration = stream
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| "missing duration".to_string())?;

    Ok(VideoMetadata {
        duration,
        fps,
        width,
        height,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse `30000/1001` or `29.97`; zero and malformed rates are `None`
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// A video file decoded one frame at a time on demand
///
/// The most recently decoded frame is kept, so resampling to a higher rate
/// does not decode the same source frame twice in a row.
pub struct VideoFileSource {
    path: PathBuf,
    metadata: VideoMetadata,
    last: Mutex<Option<(usize, Frame)>>,
}

impl VideoFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = read_video_metadata(&path)?;
        info!(
            "Video metadata for {:?}: {}x{} @ {:.2}fps, {:.2}s ({})",
            path, metadata.width, metadata.height, metadata.fps, metadata.duration, metadata.codec
        );
        Ok(Self {
            path,
            metadata,
            last: Mutex::new(None),
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn frame_index(&self, t: f64) -> usize {
        let last_index = ((self.metadata.duration * self.metadata.fps).ceil() as usize).max(1) - 1;
        (((t * self.metadata.fps) + 1e-6).floor().max(0.0) as usize).min(last_index)
    }

    fn decode(&self, index: usize) -> Result<Frame> {
        let timestamp = index as f64 / self.metadata.fps;
        let args = frame_args(&self.path, timestamp, self.metadata.width, self.metadata.height);
        debug!("Extracting frame {} of {:?} at {:.3}s", index, self.path, timestamp);

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VideoError::FrameProcessingFailed {
                reason: format!("FFmpeg execution failed: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::FrameProcessingFailed {
                reason: format!("FFmpeg failed: {}", stderr),
            }
            .into());
        }

        let expected = self.metadata.width as usize * self.metadata.height as usize * 3;
        if output.stdout.len() < expected {
            return Err(VideoError::FrameProcessingFailed {
                reason: format!(
                    "no frame decoded at {:.3}s of {}",
                    timestamp,
                    self.path.display()
                ),
            }
            .into());
        }

        let mut bytes = output.stdout;
        bytes.truncate(expected);
        Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, bytes).ok_or_else(|| {
            VideoError::FrameProcessingFailed {
                reason: "decoded frame has the wrong size".to_string(),
            }
            .into()
        })
    }
}

impl FrameSource for VideoFileSource {
    fn duration(&self) -> f64 {
        self.metadata.duration
    }

    fn fps(&self) -> f64 {
        self.metadata.fps
    }

    fn size(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let index = self.frame_index(t);
        if let Ok(cached) = self.last.lock() {
            if let Some((cached_index, frame)) = cached.as_ref() {
                if *cached_index == index {
                    return Ok(frame.clone());
                }
            }
        }

        let mut frame = self.decode(index);
        // Container durations can overshoot the last decodable frame
        if frame.is_err() && index > 0 {
            frame = self.decode(index - 1);
        }
        let frame = frame?;

        if let Ok(mut cached) = self.last.lock() {
            *cached = Some((index, frame.clone()));
        }
        Ok(frame)
    }
}

/// ffmpeg arguments that write one raw RGB frame at `timestamp` to stdout
fn frame_args(path: &Path, timestamp: f64, width: u32, height: u32) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.6}", timestamp),
        "-i".to_string(),
        path.display().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-s".to_string(),
        format!("{}x{}", width, height),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-".to_string(),
    ]
}

/// Open a video file as a lazily decoded clip
pub fn open_video<P: AsRef<Path>>(path: P) -> Result<Clip> {
    Ok(Clip::new(VideoFileSource::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let json = br#"{
            "streams": [{
                "codec_type": "video",
                "codec_name": "h264",
                "width": 640,
                "height": 360,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "0/0"
            }],
            "format": { "duration": "4.500000" }
        }"#;
        let metadata = parse_ffprobe_json(json).unwrap();
        assert_eq!(
            metadata,
            VideoMetadata {
                duration: 4.5,
                fps: 30.0,
                width: 640,
                height: 360,
                codec: "h264".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_ffprobe_json_rejects_audio_only() {
        let json = br#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "3.0" } }"#;
        assert!(parse_ffprobe_json(json).is_err());
        assert!(parse_ffprobe_json(b"not json").is_err());
    }

    #[test]
    fn test_frame_args_seek_before_input() {
        let args = frame_args(Path::new("clip.mp4"), 1.5, 32, 16);
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek < input);
        assert_eq!(args[seek + 1], "1.500000");
        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "32x16"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_decode_generated_video() {
        if !tool_available("ffmpeg") || !tool_available("ffprobe") {
            return;
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("red.mp4");
        let status = Command::new("ffmpeg")
            .args(["-v", "error", "-f", "lavfi", "-i", "color=c=red:s=32x16:r=10:d=1"])
            .args(["-pix_fmt", "yuv420p", "-y"])
            .arg(&path)
            .status()
            .unwrap();
        if !status.success() {
            return;
        }

        let clip = open_video(&path).unwrap();
        assert_eq!(clip.size(), (32, 16));
        assert!((clip.fps() - 10.0).abs() < 1e-6);
        assert!((clip.duration() - 1.0).abs() < 0.1);

        let frame = clip.frame_at(0.5).unwrap();
        let pixel = frame.get_pixel(16, 8);
        assert!(pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60, "got {:?}", pixel);
        assert_eq!(clip.frame_at(clip.duration()).unwrap().dimensions(), (32, 16));
    }
}
