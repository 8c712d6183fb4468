//! # Composition
//!
//! Normalizes a batch of clips onto a shared frame rate and canvas, then
//! stitches them into a single timeline with the requested transition.

pub mod engine;
pub mod normalizer;
pub mod transitions;

// Re-exports for convenience
pub use engine::{ConcatMode, ConcatenationEngine};
pub use normalizer::{conform, conform_all, normalize, NormalizationTarget};
pub use transitions::{composite, composite_named, effective_duration, TransitionKind, TransitionSpec};
