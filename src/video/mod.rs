//! # Video Module
//!
//! Frames, the lazily rendered [`Clip`] handle, layer compositing, and the
//! file boundaries: loading images and videos, and encoding through ffmpeg.

pub mod clip;
pub mod composite;
pub mod encoder;
pub mod ffmpeg;
pub mod loader;
pub mod types;

pub use clip::{Clip, FrameSource, TIME_EPSILON};
pub use composite::{canvas_size, compose, concatenate, Layer, Motion, Placement};
pub use encoder::{EncodedVideo, VideoEncoder};
pub use ffmpeg::{open_video, read_video_metadata, VideoFileSource, VideoMetadata};
pub use loader::ClipLoader;
pub use types::{Frame, BLACK, WHITE};
