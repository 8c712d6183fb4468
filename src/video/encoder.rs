use std::path::{Path, PathBuf};
use std::process::Command;

use rayon::prelude::*;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::OutputConfig;
use crate::error::{Result, VideoError};
use crate::video::{clip::Clip, ffmpeg, types::Frame};

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: String,
    pub duration: f64,
    pub frame_count: usize,
    pub file_size: u64,
}

/// Renders a clip to PNG frames and hands them to ffmpeg
pub struct VideoEncoder {
    output: OutputConfig,
    temp_dir: Option<PathBuf>,
}

impl VideoEncoder {
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            temp_dir: None,
        }
    }

    pub fn check_ffmpeg_available() -> bool {
        ffmpeg::tool_available("ffmpeg")
    }

    fn ensure_temp_dir(&mut self) -> Result<PathBuf> {
        if let Some(ref temp_dir) = self.temp_dir {
            return Ok(temp_dir.clone());
        }

        let temp_dir = PathBuf::from(format!("./temp_clip_compositor_{}", std::process::id()));
        std::fs::create_dir_all(&temp_dir)?;
        self.temp_dir = Some(temp_dir.clone());
        Ok(temp_dir)
    }

    /// Render every frame of `clip` into `directory` as `frame_%06d.png`
    ///
    /// Frames are rendered and written on a dedicated pool of
    /// `processing_threads` workers. Returns the number of frames written.
    pub fn write_frames<P: AsRef<Path>>(&self, clip: &Clip, directory: P) -> Result<usize> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let frame_count = clip.frame_count();
        let fps = clip.fps();
        debug!("Writing {} frames to {:?}", frame_count, directory);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.output.processing_threads.max(1))
            .build()
            .map_err(|e| VideoError::FrameProcessingFailed {
                reason: format!("Failed to build render pool: {}", e),
            })?;

        pool.install(|| {
            (0..frame_count).into_par_iter().try_for_each(|i| {
                let frame = clip.frame_at(i as f64 / fps)?;
                save_frame(&frame, &directory.join(frame_file_name(i)))
            })
        })?;

        info!("Saved {} frames as images", frame_count);
        Ok(frame_count)
    }

    /// Encode `clip` into a video file at `output_path`
    pub async fn encode<P: AsRef<Path>>(&mut self, clip: &Clip, output_path: P) -> Result<EncodedVideo> {
        let output_path = output_path.as_ref();

        if !Self::check_ffmpeg_available() {
            return Err(VideoError::EncodingFailed {
                reason: "FFmpeg not found. Please install FFmpeg.".to_string(),
            }
            .into());
        }

        let temp_dir = self.ensure_temp_dir()?;
        let frame_count = self.write_frames(clip, &temp_dir)?;
        if frame_count == 0 {
            return Err(VideoError::EncodingFailed {
                reason: "Timeline has no frames to encode".to_string(),
            }
            .into());
        }

        info!(
            "Encoding {} frames with {} ({}, {})",
            frame_count, self.output.codec, self.output.bitrate, self.output.preset
        );
        let cmd = self.ffmpeg_command(&temp_dir, clip.fps(), output_path);
        run_ffmpeg(cmd).await?;

        let metadata = std::fs::metadata(output_path)?;
        let encoded = EncodedVideo {
            path: output_path.display().to_string(),
            duration: clip.duration(),
            frame_count,
            file_size: metadata.len(),
        };

        info!("Video encoding complete: {}KB", encoded.file_size / 1024);
        self.cleanup();
        Ok(encoded)
    }

    fn ffmpeg_command(&self, frame_dir: &Path, fps: f64, output_path: &Path) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(self.ffmpeg_args(frame_dir, fps, output_path));
        cmd
    }

    fn ffmpeg_args(&self, frame_dir: &Path, fps: f64, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            frame_dir.join("frame_%06d.png").display().to_string(),
            "-c:v".to_string(),
            self.output.codec.as_str().to_string(),
            "-b:v".to_string(),
            self.output.bitrate.clone(),
        ];
        if self.output.codec.supports_preset() {
            args.push("-preset".to_string());
            args.push(self.output.preset.as_str().to_string());
        }
        args.extend(
            ["-pix_fmt", "yuv420p", "-y"]
                .iter()
                .map(|arg| arg.to_string()),
        );
        args.push(output_path.display().to_string());
        args
    }

    pub fn cleanup(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&temp_dir) {
                warn!("Failed to remove temporary directory: {}", e);
            }
        }
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn frame_file_name(index: usize) -> String {
    format!("frame_{:06}.png", index)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    frame.save_png(path).map_err(|e| {
        VideoError::EncodingFailed {
            reason: format!("Failed to save frame {:?}: {}", path, e),
        }
        .into()
    })
}

async fn run_ffmpeg(mut cmd: Command) -> Result<()> {
    let output = task::spawn_blocking(move || cmd.output())
        .await
        .map_err(|e| VideoError::EncodingFailed {
            reason: format!("Failed to spawn FFmpeg process: {}", e),
        })?
        .map_err(|e| VideoError::EncodingFailed {
            reason: format!("FFmpeg execution failed: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VideoError::EncodingFailed {
            reason: format!("FFmpeg failed: {}", stderr),
        }
        .into());
    }

    Ok(())
}
