use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompositorError, Result};
use crate::video::{Clip, TIME_EPSILON};

/// Shared frame rate and canvas size for a batch of clips
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationTarget {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl NormalizationTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when `clip` already runs at this rate and size
    pub fn matches(&self, clip: &Clip) -> bool {
        (clip.fps() - self.fps).abs() <= TIME_EPSILON && clip.size() == self.size()
    }
}

/// Work out the common target for `clips`
///
/// The canvas is the element-wise maximum of every clip's width and height so
/// no clip loses detail. The rate is `fps_override` when given, otherwise the
/// rate of the first clip.
pub fn normalize(clips: &[Clip], fps_override: Option<f64>) -> Result<NormalizationTarget> {
    let first = clips
        .first()
        .ok_or_else(|| CompositorError::invalid_input("cannot normalize an empty clip sequence"))?;

    if let Some(fps) = fps_override {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CompositorError::invalid_input(format!(
                "frame rate override must be positive, got {}",
                fps
            )));
        }
    }

    let width = clips.iter().map(Clip::width).max().unwrap_or(0);
    let height = clips.iter().map(Clip::height).max().unwrap_or(0);

    let target = NormalizationTarget {
        fps: fps_override.unwrap_or_else(|| first.fps()),
        width,
        height,
    };

    debug!(
        "Normalization target for {} clips: {:.3} fps, {}x{}",
        clips.len(),
        target.fps,
        target.width,
        target.height
    );
    Ok(target)
}

/// Resample and resize `clip` to `target`
///
/// Each step is skipped when the clip already matches, so conforming an
/// already conformed clip hands back the same clip.
pub fn conform(clip: &Clip, target: &NormalizationTarget) -> Result<Clip> {
    clip.with_fps(target.fps)?.resized(target.width, target.height)
}

/// Conform every clip in order
pub fn conform_all(clips: &[Clip], target: &NormalizationTarget) -> Result<Vec<Clip>> {
    clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            if !target.matches(clip) {
                debug!(
                    "Conforming clip {}: {:.3} fps {}x{} -> {:.3} fps {}x{}",
                    i,
                    clip.fps(),
                    clip.width(),
                    clip.height(),
                    target.fps,
                    target.width,
                    target.height
                );
            }
            conform(clip, target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(size: (u32, u32), fps: f64) -> Clip {
        Clip::solid([40, 80, 120], size, 1.0, fps).unwrap()
    }

    #[test]
    fn test_resolution_is_elementwise_max() {
        let clips = vec![clip((640, 360), 30.0), clip((320, 480), 24.0), clip((100, 100), 60.0)];
        let target = normalize(&clips, None).unwrap();

        assert_eq!(target.width, 640);
        assert_eq!(target.height, 480);
        assert_eq!(target.fps, 30.0);
    }

    #[test]
    fn test_rate_comes_from_first_clip_not_highest() {
        let clips = vec![clip((64, 64), 24.0), clip((64, 64), 60.0)];
        assert_eq!(normalize(&clips, None).unwrap().fps, 24.0);
    }

    #[test]
    fn test_single_clip_targets_itself() {
        let single = clip((320, 240), 25.0);
        let target = normalize(&[single], None).unwrap();
        assert_eq!(
            target,
            NormalizationTarget {
                fps: 25.0,
                width: 320,
                height: 240
            }
        );
    }

    #[test]
    fn test_override_wins() {
        let clips = vec![clip((64, 64), 30.0), clip((32, 32), 24.0)];
        let target = normalize(&clips, Some(12.5)).unwrap();
        assert_eq!(target.fps, 12.5);
        assert_eq!(target.size(), (64, 64));
    }

    #[test]
    fn test_empty_and_bad_override_fail() {
        assert!(matches!(
            normalize(&[], None),
            Err(CompositorError::InvalidInput { .. })
        ));
        assert!(normalize(&[clip((8, 8), 30.0)], Some(0.0)).is_err());
        assert!(normalize(&[clip((8, 8), 30.0)], Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_conform_is_idempotent() {
        let clips = vec![clip((64, 48), 30.0), clip((32, 32), 24.0)];
        let target = normalize(&clips, None).unwrap();

        let conformed = conform_all(&clips, &target).unwrap();
        for clip in &conformed {
            assert!(target.matches(clip));
        }

        // Already conformed clips come back untouched
        assert!(conformed[0].same_source(&clips[0]));
        let again = conform(&conformed[1], &target).unwrap();
        assert!(again.same_source(&conformed[1]));
        assert_eq!(again.size(), conformed[1].size());
        assert_eq!(again.fps(), conformed[1].fps());
    }
}
