use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{CompositorError, Result, VideoError};
use crate::video::{clip::Clip, ffmpeg, types::Frame};

/// Turns files on disk into clips
///
/// A directory becomes an image sequence played at `fps`, a single image
/// becomes a still shown for `still_duration` seconds, and a video file is
/// decoded through ffmpeg at its own rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipLoader {
    pub fps: f64,
    pub still_duration: f64,
}

impl Default for ClipLoader {
    fn default() -> Self {
        Self {
            fps: 30.0,
            still_duration: 3.0,
        }
    }
}

impl ClipLoader {
    pub fn new(fps: f64, still_duration: f64) -> Self {
        Self { fps, still_duration }
    }

    /// Load a directory of images or a single image file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Clip> {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_image_sequence(path)
        } else if path.is_file() {
            if Self::is_image_file(path) {
                self.load_still(path)
            } else if Self::is_video_file(path) {
                self.load_video(path)
            } else {
                Err(VideoError::UnsupportedFormat {
                    format: path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                }
                .into())
            }
        } else {
            Err(load_failed(path))
        }
    }

    /// Load every path in order
    pub fn load_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Clip>> {
        let clips = paths
            .iter()
            .map(|path| self.load(path))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} clips", clips.len());
        Ok(clips)
    }

    /// Load the images in `directory`, sorted by file name
    ///
    /// Frames that differ in size from the first one are resized to match.
    pub fn load_image_sequence<P: AsRef<Path>>(&self, directory: P) -> Result<Clip> {
        let directory = directory.as_ref();
        let paths = Self::image_files_in(directory)?;
        if paths.is_empty() {
            return Err(VideoError::LoadFailed {
                path: format!("No image files found in {}", directory.display()),
            }
            .into());
        }

        let frames = paths
            .par_iter()
            .map(|path| load_frame(path))
            .collect::<Result<Vec<_>>>()?;
        let frames = match_first_size(frames);

        debug!("Loaded {} frames from {:?}", frames.len(), directory);
        let clip = Clip::from_frames(frames, self.fps)?;
        info!(
            "Loaded sequence {:?}: {} frames, {:.2}s",
            directory,
            clip.frame_count(),
            clip.duration()
        );
        Ok(clip)
    }

    pub fn load_still<P: AsRef<Path>>(&self, path: P) -> Result<Clip> {
        let path = path.as_ref();
        let frame = load_frame(path)?;
        debug!("Loaded still {:?} ({}x{})", path, frame.width(), frame.height());
        Clip::still(frame, self.still_duration, self.fps)
    }

    /// Open a video file; frames are decoded lazily as they are rendered
    pub fn load_video<P: AsRef<Path>>(&self, path: P) -> Result<Clip> {
        let path = path.as_ref();
        if !ffmpeg::tool_available("ffprobe") {
            return Err(VideoError::LoadFailed {
                path: format!("{}: ffprobe not found. Please install FFmpeg.", path.display()),
            }
            .into());
        }
        let clip = ffmpeg::open_video(path)?;
        info!(
            "Loaded video {:?}: {}x{}, {:.2} fps, {:.2}s",
            path,
            clip.width(),
            clip.height(),
            clip.fps(),
            clip.duration()
        );
        Ok(clip)
    }

    fn image_files_in(directory: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && !Self::is_hidden_file(&path) && Self::is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub fn is_image_file<P: AsRef<Path>>(path: P) -> bool {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"),
            None => false,
        }
    }

    pub fn is_video_file<P: AsRef<Path>>(path: P) -> bool {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) => matches!(
                ext.to_lowercase().as_str(),
                "mp4" | "avi" | "mov" | "mkv" | "webm" | "m4v"
            ),
            None => false,
        }
    }

    pub fn is_hidden_file<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }
}

fn load_failed(path: &Path) -> CompositorError {
    VideoError::LoadFailed {
        path: path.display().to_string(),
    }
    .into()
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path).map_err(|e| {
        warn!("Could not decode {:?}: {}", path, e);
        load_failed(path)
    })?;

    let rgb_image = match image {
        image::DynamicImage::ImageRgb8(img) => img,
        _ => image.to_rgb8(),
    };
    Ok(Frame::new(rgb_image))
}

fn match_first_size(frames: Vec<Frame>) -> Vec<Frame> {
    let Some(size) = frames.first().map(Frame::dimensions) else {
        return frames;
    };
    frames
        .into_iter()
        .map(|frame| {
            if frame.dimensions() == size {
                frame
            } else {
                warn!(
                    "Resizing {}x{} frame to {}x{}",
                    frame.width(),
                    frame.height(),
                    size.0,
                    size.1
                );
                Frame::new(imageops::resize(frame.as_image(), size.0, size.1, FilterType::Lanczos3))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_png(path: &Path, size: (u32, u32), color: [u8; 3]) {
        Frame::new_filled(size.0, size.1, color).save_png(path).unwrap();
    }

    #[test]
    fn test_load_sequence_sorted_and_skips_hidden() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("b.png"), (4, 4), [0, 255, 0]);
        write_png(&dir.path().join("a.png"), (4, 4), [255, 0, 0]);
        write_png(&dir.path().join(".hidden.png"), (4, 4), [0, 0, 255]);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let clip = ClipLoader::new(2.0, 1.0).load(dir.path()).unwrap();
        assert_eq!(clip.frame_count(), 2);
        assert!((clip.duration() - 1.0).abs() < 1e-9);
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0), [255, 0, 0]);
        assert_eq!(clip.frame_at(0.5).unwrap().get_pixel(0, 0), [0, 255, 0]);
    }

    #[test]
    fn test_mismatched_frames_are_resized() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("0.png"), (8, 6), [10, 10, 10]);
        write_png(&dir.path().join("1.png"), (4, 4), [20, 20, 20]);

        let clip = ClipLoader::default().load(dir.path()).unwrap();
        assert_eq!(clip.size(), (8, 6));
        assert_eq!(clip.frame_at(clip.duration()).unwrap().dimensions(), (8, 6));
    }

    #[test]
    fn test_load_still() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("still.png");
        write_png(&path, (6, 3), [1, 2, 3]);

        let clip = ClipLoader::new(10.0, 2.5).load(&path).unwrap();
        assert_eq!(clip.size(), (6, 3));
        assert!((clip.duration() - 2.5).abs() < 1e-9);
        assert_eq!(clip.frame_count(), 25);
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ClipLoader::default().load(dir.path()),
            Err(CompositorError::Video(VideoError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn test_unsupported_and_missing_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not a clip").unwrap();

        assert!(matches!(
            ClipLoader::default().load(&path),
            Err(CompositorError::Video(VideoError::UnsupportedFormat { .. }))
        ));
        assert!(matches!(
            ClipLoader::default().load(dir.path().join("missing.png")),
            Err(CompositorError::Video(VideoError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn test_corrupt_video_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();

        // Routed to the video path, and rejected there whether or not ffprobe exists
        assert!(matches!(
            ClipLoader::default().load(&path),
            Err(CompositorError::Video(VideoError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn test_load_generated_video() {
        if !ffmpeg::tool_available("ffmpeg") || !ffmpeg::tool_available("ffprobe") {
            return;
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("blue.mp4");
        let status = std::process::Command::new("ffmpeg")
            .args(["-v", "error", "-f", "lavfi", "-i", "color=c=blue:s=16x16:r=5:d=2"])
            .args(["-pix_fmt", "yuv420p", "-y"])
            .arg(&path)
            .status()
            .unwrap();
        if !status.success() {
            return;
        }

        let loader = ClipLoader::new(30.0, 1.0);
        let clip = loader.load(&path).unwrap();
        // Videos keep their own rate rather than the image sequence rate
        assert!((clip.fps() - 5.0).abs() < 1e-6);
        assert_eq!(clip.size(), (16, 16));
    }

    #[test]
    fn test_file_classification() {
        assert!(ClipLoader::is_image_file("frame.PNG"));
        assert!(ClipLoader::is_image_file("frame.jpeg"));
        assert!(!ClipLoader::is_image_file("clip.mov"));
        assert!(ClipLoader::is_video_file("clip.MOV"));
        assert!(ClipLoader::is_video_file("clip.mp4"));
        assert!(!ClipLoader::is_video_file("frame.png"));
        assert!(ClipLoader::is_hidden_file("/tmp/.DS_Store"));
        assert!(!ClipLoader::is_hidden_file("/tmp/frame.png"));
    }
}
