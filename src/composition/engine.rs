use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    composition::{
        normalizer::{conform_all, normalize},
        transitions::{composite, TransitionKind, TransitionSpec},
    },
    config::CompositionConfig,
    error::{CompositorError, Result},
    video::{concatenate, Clip},
};

/// How clips are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatMode {
    /// Hard cuts, whatever transition is configured
    #[default]
    Simple,
    /// Apply the configured transition at every junction
    Transition,
}

/// Turns a batch of loaded clips into one timeline
///
/// The engine follows a fixed pipeline:
/// 1. Normalization - pick the shared frame rate and canvas
/// 2. Conforming - resample and resize each clip to that target
/// 3. Compositing - join the clips, with or without transitions
pub struct ConcatenationEngine {
    config: CompositionConfig,
}

impl ConcatenationEngine {
    pub fn new(config: CompositionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// The transition applied at junctions, or `none` in simple mode
    pub fn transition_spec(&self) -> TransitionSpec {
        match self.config.mode {
            ConcatMode::Simple => TransitionSpec::new(TransitionKind::None, self.config.transition_duration),
            ConcatMode::Transition => {
                TransitionSpec::new(self.config.transition, self.config.transition_duration)
            }
        }
    }

    /// Join `clips` in order into one timeline
    ///
    /// A single clip is handed back as-is without being normalized.
    pub fn concatenate(&self, clips: &[Clip]) -> Result<Clip> {
        match clips {
            [] => Err(CompositorError::invalid_input("no clips provided for concatenation")),
            [single] => {
                debug!("Single clip, nothing to join");
                Ok(single.clone())
            }
            _ => self.join(clips),
        }
    }

    fn join(&self, clips: &[Clip]) -> Result<Clip> {
        info!("Joining {} clips", clips.len());

        let target = normalize(clips, self.config.frame_rate)?;
        info!(
            "   Target: {:.2} fps, {}x{}",
            target.fps, target.width, target.height
        );

        let conformed = conform_all(clips, &target)?;

        let spec = self.transition_spec();
        let timeline = if spec.kind == TransitionKind::None {
            concatenate(&conformed)?
        } else {
            info!("   Transition: {} ({:.2}s)", spec.kind, spec.duration);
            composite(&conformed, &spec)?
        };

        info!(
            "   Timeline: {:.2}s, {} frames",
            timeline.duration(),
            timeline.frame_count()
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: ConcatMode, transition: TransitionKind) -> CompositionConfig {
        CompositionConfig {
            mode,
            transition,
            transition_duration: 1.0,
            frame_rate: None,
        }
    }

    fn clips() -> Vec<Clip> {
        vec![
            Clip::solid([255, 0, 0], (32, 16), 3.0, 30.0).unwrap(),
            Clip::solid([0, 0, 255], (16, 24), 3.0, 24.0).unwrap(),
        ]
    }

    #[test]
    fn test_empty_input_fails() {
        let engine = ConcatenationEngine::new(CompositionConfig::default());
        assert!(matches!(
            engine.concatenate(&[]),
            Err(CompositorError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_single_clip_passthrough() {
        let engine = ConcatenationEngine::new(config(ConcatMode::Transition, TransitionKind::Crossfade));
        let clip = Clip::solid([1, 2, 3], (10, 10), 2.0, 12.0).unwrap();
        assert!(engine.concatenate(&[clip.clone()]).unwrap().same_source(&clip));
    }

    #[test]
    fn test_simple_mode_ignores_transition() {
        let engine = ConcatenationEngine::new(config(ConcatMode::Simple, TransitionKind::Crossfade));
        let timeline = engine.concatenate(&clips()).unwrap();

        assert!((timeline.duration() - 6.0).abs() < 1e-6);
        assert_eq!(timeline.size(), (32, 24));
        assert_eq!(timeline.fps(), 30.0);
    }

    #[test]
    fn test_transition_mode_overlaps() {
        let engine = ConcatenationEngine::new(config(ConcatMode::Transition, TransitionKind::Crossfade));
        let timeline = engine.concatenate(&clips()).unwrap();

        assert!((timeline.duration() - 5.0).abs() < 1e-6);
        assert_eq!(timeline.size(), (32, 24));
        assert_eq!(timeline.frame_at(4.5).unwrap().dimensions(), (32, 24));
    }

    #[test]
    fn test_frame_rate_override() {
        let mut cfg = config(ConcatMode::Simple, TransitionKind::None);
        cfg.frame_rate = Some(10.0);
        let timeline = ConcatenationEngine::new(cfg).concatenate(&clips()).unwrap();

        assert_eq!(timeline.fps(), 10.0);
        assert_eq!(timeline.frame_count(), 60);
    }
}
