use std::fmt;
use std::sync::Arc;

use image::imageops::{self, FilterType};

use crate::error::{CompositorError, Result};
use crate::video::types::Frame;

/// Tolerance used when comparing clip times and frame rates
pub const TIME_EPSILON: f64 = 1e-9;

/// Anything that can produce frames over time
///
/// Implementations are immutable once built: every transform on [`Clip`]
/// wraps its input in a new source instead of modifying it.
pub trait FrameSource: Send + Sync {
    /// Length in seconds
    fn duration(&self) -> f64;

    /// Nominal frames per second
    fn fps(&self) -> f64;

    /// Frame size as `(width, height)`
    fn size(&self) -> (u32, u32);

    /// Render the frame shown at `t` seconds, with `0 <= t <= duration`
    fn frame_at(&self, t: f64) -> Result<Frame>;
}

/// Shared handle to an immutable frame source
///
/// Cloning a clip is cheap; the underlying source is reference counted.
#[derive(Clone)]
pub struct Clip {
    source: Arc<dyn FrameSource>,
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        write!(
            f,
            "Clip(duration={:.2}s, fps={}, size={}x{})",
            self.duration(),
            self.fps(),
            width,
            height
        )
    }
}

impl Clip {
    /// Wrap a frame source
    pub fn new<S: FrameSource + 'static>(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Build a clip from an in-memory frame sequence
    ///
    /// Frame `i` covers `[i / fps, (i + 1) / fps)`.
    pub fn from_frames(frames: Vec<Frame>, fps: f64) -> Result<Self> {
        ImageSequence::new(frames, fps).map(Self::new)
    }

    /// A clip that shows the same frame for `duration` seconds
    pub fn still(frame: Frame, duration: f64, fps: f64) -> Result<Self> {
        check_rate(fps)?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(CompositorError::invalid_input(format!(
                "still duration must be non-negative, got {}",
                duration
            )));
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(CompositorError::invalid_input("still frame has zero size"));
        }
        Ok(Self::new(StillSource {
            frame,
            duration,
            fps,
        }))
    }

    /// A solid color clip
    pub fn solid(color: [u8; 3], size: (u32, u32), duration: f64, fps: f64) -> Result<Self> {
        Self::still(Frame::new_filled(size.0, size.1, color), duration, fps)
    }

    pub fn duration(&self) -> f64 {
        self.source.duration()
    }

    pub fn fps(&self) -> f64 {
        self.source.fps()
    }

    pub fn size(&self) -> (u32, u32) {
        self.source.size()
    }

    pub fn width(&self) -> u32 {
        self.size().0
    }

    pub fn height(&self) -> u32 {
        self.size().1
    }

    /// Render the frame at `t` seconds; out-of-range times are clamped into the clip
    pub fn frame_at(&self, t: f64) -> Result<Frame> {
        let t = if t.is_finite() { t } else { 0.0 };
        self.source.frame_at(t.clamp(0.0, self.duration().max(0.0)))
    }

    /// Number of frames the clip yields at its own rate
    pub fn frame_count(&self) -> usize {
        frames_in(self.duration(), self.fps())
    }

    /// Extract frames between `start` and `end` seconds
    ///
    /// `fps` defaults to the clip's own rate and `end` to its duration. Both
    /// times are clamped into the clip.
    pub fn to_frames(&self, fps: Option<f64>, start: f64, end: Option<f64>) -> Result<Vec<Frame>> {
        let fps = fps.filter(|rate| *rate > 0.0).unwrap_or_else(|| self.fps());
        check_rate(fps)?;
        if !start.is_finite() || end.map_or(false, |end| !end.is_finite()) {
            return Err(CompositorError::invalid_input(format!(
                "frame range must be finite, got {}..{:?}",
                start, end
            )));
        }

        let duration = self.duration();
        let start = start.clamp(0.0, duration);
        let end = end
            .filter(|end| *end > 0.0)
            .unwrap_or(duration)
            .clamp(start, duration);

        let mut frames = Vec::new();
        for i in 0..frames_in(end - start, fps) {
            let t = start + i as f64 / fps;
            if t >= end {
                break;
            }
            frames.push(self.frame_at(t)?);
        }

        if frames.is_empty() {
            return Err(CompositorError::invalid_input(format!(
                "no frames between {:.3}s and {:.3}s",
                start, end
            )));
        }
        Ok(frames)
    }

    /// The part of the clip between `start` and `end` seconds
    pub fn subclip(&self, start: f64, end: f64) -> Result<Clip> {
        let duration = self.duration();
        if !start.is_finite() || !end.is_finite() || start < -TIME_EPSILON || end < start {
            return Err(CompositorError::invalid_input(format!(
                "invalid subclip range {:.3}s..{:.3}s",
                start, end
            )));
        }
        if end > duration + TIME_EPSILON {
            return Err(CompositorError::invalid_input(format!(
                "subclip end {:.3}s is past clip duration {:.3}s",
                end, duration
            )));
        }

        let start = start.max(0.0);
        let end = end.min(duration);
        if start <= TIME_EPSILON && end >= duration - TIME_EPSILON {
            return Ok(self.clone());
        }

        Ok(Self::new(SubclipSource {
            inner: self.clone(),
            start,
            duration: end - start,
        }))
    }

    /// Declare a new frame rate; no-op when the rate already matches
    pub fn with_fps(&self, fps: f64) -> Result<Clip> {
        check_rate(fps)?;
        if (self.fps() - fps).abs() <= TIME_EPSILON {
            return Ok(self.clone());
        }
        Ok(Self::new(ResampledSource {
            inner: self.clone(),
            fps,
        }))
    }

    /// Resize every frame; no-op when the size already matches
    pub fn resized(&self, width: u32, height: u32) -> Result<Clip> {
        if width == 0 || height == 0 {
            return Err(CompositorError::invalid_input(format!(
                "invalid target resolution {}x{}",
                width, height
            )));
        }
        if self.size() == (width, height) {
            return Ok(self.clone());
        }
        Ok(Self::new(ResizedSource {
            inner: self.clone(),
            width,
            height,
        }))
    }

    /// Play back `factor` times faster
    pub fn with_speed(&self, factor: f64) -> Result<Clip> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CompositorError::invalid_input(format!(
                "speed factor must be positive, got {}",
                factor
            )));
        }
        if (factor - 1.0).abs() <= TIME_EPSILON {
            return Ok(self.clone());
        }
        Ok(Self::new(SpeedSource {
            inner: self.clone(),
            factor,
        }))
    }

    /// Apply `f` to every frame as it is rendered; `f` receives the local time
    pub fn map_frames<F>(&self, f: F) -> Clip
    where
        F: Fn(&mut Frame, f64) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(MappedSource {
            inner: self.clone(),
            transform: Box::new(f),
        })
    }

    /// Fade in from `color` over the first `duration` seconds
    pub fn fade_in(&self, duration: f64, color: [u8; 3]) -> Result<Clip> {
        self.fade(duration, color, FadeDirection::In)
    }

    /// Fade out to `color` over the last `duration` seconds
    pub fn fade_out(&self, duration: f64, color: [u8; 3]) -> Result<Clip> {
        self.fade(duration, color, FadeDirection::Out)
    }

    fn fade(&self, duration: f64, color: [u8; 3], direction: FadeDirection) -> Result<Clip> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CompositorError::invalid_input(format!(
                "fade duration must be non-negative, got {}",
                duration
            )));
        }
        if duration <= TIME_EPSILON {
            return Ok(self.clone());
        }
        Ok(Self::new(FadeSource {
            inner: self.clone(),
            duration: duration.min(self.duration()),
            color,
            direction,
        }))
    }

    /// True when both handles point at the very same source
    pub fn same_source(&self, other: &Clip) -> bool {
        Arc::as_ptr(&self.source) as *const () == Arc::as_ptr(&other.source) as *const ()
    }
}

fn check_rate(fps: f64) -> Result<()> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(CompositorError::invalid_input(format!(
            "frame rate must be positive, got {}",
            fps
        )));
    }
    Ok(())
}

fn frames_in(duration: f64, fps: f64) -> usize {
    ((duration * fps) + TIME_EPSILON).floor().max(0.0) as usize
}

/// In-memory frames played back at a fixed rate
struct ImageSequence {
    frames: Vec<Frame>,
    fps: f64,
    size: (u32, u32),
}

impl ImageSequence {
    fn new(frames: Vec<Frame>, fps: f64) -> Result<Self> {
        check_rate(fps)?;
        let size = frames
            .first()
            .map(Frame::dimensions)
            .ok_or_else(|| CompositorError::invalid_input("cannot build a clip from zero frames"))?;
        if size.0 == 0 || size.1 == 0 {
            return Err(CompositorError::invalid_input("frames have zero size"));
        }
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.dimensions() != size)
        {
            return Err(CompositorError::invalid_input(format!(
                "frame {} is {}x{}, expected {}x{}",
                index,
                frame.width(),
                frame.height(),
                size.0,
                size.1
            )));
        }
        Ok(Self { frames, fps, size })
    }
}

impl FrameSource for ImageSequence {
    fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let index = ((t * self.fps) + 1e-6).floor().max(0.0) as usize;
        let index = index.min(self.frames.len() - 1);
        Ok(self.frames[index].clone())
    }
}

struct StillSource {
    frame: Frame,
    duration: f64,
    fps: f64,
}

impl FrameSource for StillSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn frame_at(&self, _t: f64) -> Result<Frame> {
        Ok(self.frame.clone())
    }
}

struct SubclipSource {
    inner: Clip,
    start: f64,
    duration: f64,
}

impl FrameSource for SubclipSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        self.inner.frame_at(self.start + t)
    }
}

struct ResampledSource {
    inner: Clip,
    fps: f64,
}

impl FrameSource for ResampledSource {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        self.inner.frame_at(t)
    }
}

struct ResizedSource {
    inner: Clip,
    width: u32,
    height: u32,
}

impl FrameSource for ResizedSource {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let frame = self.inner.frame_at(t)?;
        if frame.dimensions() == (self.width, self.height) {
            return Ok(frame);
        }

        // Lanczos3 keeps edges crisp when small clips are upscaled onto a larger canvas
        let resized = imageops::resize(frame.as_image(), self.width, self.height, FilterType::Lanczos3);
        Ok(Frame::new(resized))
    }
}

struct SpeedSource {
    inner: Clip,
    factor: f64,
}

impl FrameSource for SpeedSource {
    fn duration(&self) -> f64 {
        self.inner.duration() / self.factor
    }

    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        self.inner.frame_at(t * self.factor)
    }
}

type FrameTransform = Box<dyn Fn(&mut Frame, f64) -> Result<()> + Send + Sync>;

struct MappedSource {
    inner: Clip,
    transform: FrameTransform,
}

impl FrameSource for MappedSource {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let mut frame = self.inner.frame_at(t)?;
        (self.transform)(&mut frame, t)?;
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    In,
    Out,
}

struct FadeSource {
    inner: Clip,
    duration: f64,
    color: [u8; 3],
    direction: FadeDirection,
}

impl FadeSource {
    /// How far the frame at `t` is pulled toward the fade color
    fn amount_at(&self, t: f64) -> f64 {
        match self.direction {
            FadeDirection::In => {
                if t >= self.duration {
                    0.0
                } else {
                    1.0 - t / self.duration
                }
            }
            FadeDirection::Out => {
                let fade_start = self.inner.duration() - self.duration;
                if t <= fade_start {
                    0.0
                } else {
                    (t - fade_start) / self.duration
                }
            }
        }
    }
}

impl FrameSource for FadeSource {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let mut frame = self.inner.frame_at(t)?;
        frame.fade_toward(self.color, self.amount_at(t) as f32);
        Ok(frame)
    }
}
