//! # Clip-Compositor
//!
//! Normalize clips of mixed frame rates and resolutions, then stitch them into
//! a single timeline with crossfade, fade, slide and zoom transitions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clip_compositor::{
//!     composition::{ConcatMode, ConcatenationEngine, TransitionKind},
//!     config::Config,
//!     video::{ClipLoader, VideoEncoder},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.composition.mode = ConcatMode::Transition;
//! config.composition.transition = TransitionKind::SlideLeft;
//!
//! let loader = ClipLoader::new(config.output.input_fps, config.output.still_duration);
//! let clips = loader.load_all(&["intro/", "title.png", "outro/"])?;
//!
//! let timeline = ConcatenationEngine::new(config.composition.clone()).concatenate(&clips)?;
//! VideoEncoder::new(config.output.clone())
//!     .encode(&timeline, "output.mp4")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`video`] - Frames, clips, compositing, loading and encoding
//! - [`composition`] - Normalization, transitions and the concatenation engine
//! - [`effects`] - Color grading and visual effects
//! - [`config`] - Configuration management
//!
//! ## Working with clips directly
//!
//! Clips are cheap shared handles; every transform returns a new clip and
//! frames are only rendered when asked for:
//!
//! ```rust,no_run
//! use clip_compositor::composition::composite_named;
//! use clip_compositor::video::Clip;
//!
//! # fn main() -> clip_compositor::Result<()> {
//! let red = Clip::solid([255, 0, 0], (320, 240), 3.0, 30.0)?;
//! let blue = Clip::solid([0, 0, 255], (320, 240), 3.0, 30.0)?;
//!
//! let joined = composite_named(&[red, blue], "crossfade", 1.0)?;
//! assert!((joined.duration() - 5.0).abs() < 1e-6);
//! let frames = joined.to_frames(None, 0.0, None)?;
//! # Ok(())
//! # }
//! ```

pub mod composition;
pub mod config;
pub mod effects;
pub mod error;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{ConcatenationEngine, TransitionKind, TransitionSpec},
    config::Config,
    error::{CompositorError, Result},
    video::{Clip, Frame},
};
