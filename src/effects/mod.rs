//! # Effects
//!
//! Post-processing applied to a finished timeline: color grading and a
//! single optional visual or timing effect.

pub mod color;
pub mod filters;

pub use color::{hsv_to_rgb, rgb_to_hsv, ColorGrading};
pub use filters::{Effect, EffectConfig, EffectKind};
