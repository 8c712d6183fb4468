//! # Transitions
//!
//! Stitches an ordered sequence of conformed clips into one timeline, applying
//! the chosen transition at every junction.
//!
//! | Kind | Junction | Timeline length |
//! |------|----------|-----------------|
//! | `none` | hard cut | sum of durations |
//! | `crossfade` | opacity blend, clips overlap by `d` | sum - (n-1)·d |
//! | `fade_black` / `fade_white` | fade through a solid color | sum of durations |
//! | `slide_left` / `slide_right` | outgoing clip pushed off by incoming | sum - (n-1)·d |
//! | `zoom_in` / `zoom_out` | crossfade with a scale ramp | sum - (n-1)·d |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CompositorError, Result};
use crate::video::composite::{canvas_size, compose, concatenate, Layer, Motion, Placement};
use crate::video::types::{BLACK, WHITE};
use crate::video::{Clip, TIME_EPSILON};

/// Largest scale reached by the zoom transitions
pub const ZOOM_FACTOR: f64 = 1.5;

/// Every supported junction style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    None,
    Crossfade,
    FadeBlack,
    FadeWhite,
    SlideLeft,
    SlideRight,
    ZoomIn,
    ZoomOut,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 8] = [
        TransitionKind::None,
        TransitionKind::Crossfade,
        TransitionKind::FadeBlack,
        TransitionKind::FadeWhite,
        TransitionKind::SlideLeft,
        TransitionKind::SlideRight,
        TransitionKind::ZoomIn,
        TransitionKind::ZoomOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Crossfade => "crossfade",
            Self::FadeBlack => "fade_black",
            Self::FadeWhite => "fade_white",
            Self::SlideLeft => "slide_left",
            Self::SlideRight => "slide_right",
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
        }
    }

    fn is_slide(&self) -> bool {
        matches!(self, Self::SlideLeft | Self::SlideRight)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| CompositorError::UnknownTransitionKind { kind: s.to_string() })
    }
}

/// A transition kind plus how long each junction lasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    /// Seconds
    pub duration: f64,
}

impl TransitionSpec {
    pub fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }

    /// Parse a transition name coming from outside the crate
    pub fn parse(kind: &str, duration: f64) -> Result<Self> {
        Ok(Self::new(kind.parse()?, duration))
    }

    /// Every kind except `none` needs a finite, positive duration
    pub fn validate(&self) -> Result<()> {
        if self.kind != TransitionKind::None && (!self.duration.is_finite() || self.duration <= 0.0) {
            return Err(CompositorError::invalid_input(format!(
                "{} transition needs a positive duration, got {}",
                self.kind, self.duration
            )));
        }
        Ok(())
    }
}

/// Stitch `clips` into one timeline with `spec` applied at every junction
///
/// `none` concatenates and accepts a single clip, which comes back
/// unchanged. Every other kind needs at least two clips.
pub fn composite(clips: &[Clip], spec: &TransitionSpec) -> Result<Clip> {
    if clips.is_empty() {
        return Err(CompositorError::invalid_input("cannot composite an empty clip sequence"));
    }
    if spec.kind == TransitionKind::None {
        return concatenate(clips);
    }

    spec.validate()?;
    if clips.len() < 2 {
        return Err(CompositorError::invalid_input(format!(
            "{} transition needs at least 2 clips, got {}",
            spec.kind,
            clips.len()
        )));
    }

    let duration = effective_duration(spec, clips);
    if duration <= TIME_EPSILON {
        warn!(
            "{} transition collapsed to zero length; falling back to plain concatenation",
            spec.kind
        );
        return concatenate(clips);
    }

    let canvas = canvas_size(clips);
    debug!(
        "Compositing {} clips with {} ({:.3}s) on a {}x{} canvas",
        clips.len(),
        spec.kind,
        duration,
        canvas.0,
        canvas.1
    );

    match spec.kind {
        TransitionKind::None => concatenate(clips),
        TransitionKind::Crossfade => crossfade(clips, duration, canvas, None),
        TransitionKind::FadeBlack => fade_through(clips, duration, BLACK),
        TransitionKind::FadeWhite => fade_through(clips, duration, WHITE),
        TransitionKind::SlideLeft => slide(clips, duration, canvas, -1.0),
        TransitionKind::SlideRight => slide(clips, duration, canvas, 1.0),
        TransitionKind::ZoomIn => crossfade(clips, duration, canvas, Some(Zoom::In)),
        TransitionKind::ZoomOut => crossfade(clips, duration, canvas, Some(Zoom::Out)),
    }
}

/// Parse `kind` and composite; unknown names fail with `UnknownTransitionKind`
pub fn composite_named(clips: &[Clip], kind: &str, duration: f64) -> Result<Clip> {
    composite(clips, &TransitionSpec::parse(kind, duration)?)
}

/// Transition length actually used for `clips`
///
/// The requested length is clamped so no junction reaches past a clip: every
/// clip must be at least `d` long, and for slides an interior clip gives up
/// both a head and a tail, so it must be at least `2d` long.
pub fn effective_duration(spec: &TransitionSpec, clips: &[Clip]) -> f64 {
    let last = clips.len().saturating_sub(1);
    let limit = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            let interior = i > 0 && i < last;
            if spec.kind.is_slide() && interior {
                clip.duration() / 2.0
            } else {
                clip.duration()
            }
        })
        .fold(f64::INFINITY, f64::min);

    if spec.duration > limit {
        warn!(
            "{} transition of {:.3}s is longer than the clips allow; clamping to {:.3}s",
            spec.kind, spec.duration, limit
        );
        return limit.max(0.0);
    }
    spec.duration
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zoom {
    /// Outgoing clip grows while it fades out
    In,
    /// Incoming clip shrinks to its natural size while it fades in
    Out,
}

fn crossfade(clips: &[Clip], duration: f64, canvas: (u32, u32), zoom: Option<Zoom>) -> Result<Clip> {
    let last = clips.len() - 1;
    let mut start = 0.0;
    let mut layers = Vec::with_capacity(clips.len());

    for (i, clip) in clips.iter().enumerate() {
        let mut layer = Layer::new(clip.clone(), start);
        if i > 0 {
            layer = layer.with_fade_in(duration);
        }
        if i < last {
            layer = layer.with_fade_out(duration);
        }

        match zoom {
            Some(Zoom::In) if i < last => {
                let end = clip.duration();
                layer = layer.with_motion(Motion::linear(
                    end - duration,
                    end,
                    Placement::IDENTITY,
                    Placement::scaled(ZOOM_FACTOR),
                ));
            }
            Some(Zoom::Out) if i > 0 => {
                layer = layer.with_motion(Motion::linear(
                    0.0,
                    duration,
                    Placement::scaled(ZOOM_FACTOR),
                    Placement::IDENTITY,
                ));
            }
            _ => {}
        }

        // Negative padding: the next clip starts `duration` before this one ends
        start += clip.duration() - duration;
        layers.push(layer);
    }

    compose(layers, canvas, BLACK)
}

fn fade_through(clips: &[Clip], duration: f64, color: [u8; 3]) -> Result<Clip> {
    let last = clips.len() - 1;
    let faded = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            let mut clip = clip.clone();
            if i < last {
                clip = clip.fade_out(duration, color)?;
            }
            if i > 0 {
                clip = clip.fade_in(duration, color)?;
            }
            Ok(clip)
        })
        .collect::<Result<Vec<_>>>()?;

    concatenate(&faded)
}

/// `direction` is -1.0 for a leftward push and 1.0 for a rightward one
fn slide(clips: &[Clip], duration: f64, canvas: (u32, u32), direction: f64) -> Result<Clip> {
    let last = clips.len() - 1;
    let travel = canvas.0 as f64 * direction;
    let mut segments = Vec::with_capacity(clips.len() * 2);

    for (i, clip) in clips.iter().enumerate() {
        let head = if i > 0 { duration } else { 0.0 };
        let tail = if i < last { duration } else { 0.0 };
        let body_end = clip.duration() - tail;

        if body_end - head > TIME_EPSILON {
            segments.push(clip.subclip(head, body_end)?);
        }

        if i < last {
            let outgoing = Layer::new(clip.subclip(body_end, clip.duration())?, 0.0).with_motion(
                Motion::linear(0.0, duration, Placement::IDENTITY, Placement::shifted(travel, 0.0)),
            );
            let incoming = Layer::new(clips[i + 1].subclip(0.0, duration)?, 0.0).with_motion(
                Motion::linear(0.0, duration, Placement::shifted(-travel, 0.0), Placement::IDENTITY),
            );
            segments.push(compose(vec![outgoing, incoming], canvas, BLACK)?);
        }
    }

    concatenate(&segments)
}
