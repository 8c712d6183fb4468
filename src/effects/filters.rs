use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::imageops;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CompositorError, Result},
    video::{Clip, Frame},
};

/// Names of the effects a user can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    None,
    Blur,
    Sharpen,
    MirrorX,
    MirrorY,
    SpeedUp,
    SlowDown,
    Noise,
    Vignette,
}

impl EffectKind {
    pub const ALL: [EffectKind; 9] = [
        EffectKind::None,
        EffectKind::Blur,
        EffectKind::Sharpen,
        EffectKind::MirrorX,
        EffectKind::MirrorY,
        EffectKind::SpeedUp,
        EffectKind::SlowDown,
        EffectKind::Noise,
        EffectKind::Vignette,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Blur => "blur",
            Self::Sharpen => "sharpen",
            Self::MirrorX => "mirror_x",
            Self::MirrorY => "mirror_y",
            Self::SpeedUp => "speed_up",
            Self::SlowDown => "slow_down",
            Self::Noise => "noise",
            Self::Vignette => "vignette",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| CompositorError::UnknownEffectKind { kind: s.to_string() })
    }
}

/// User-facing effect settings
///
/// Only the fields relevant to `kind` are read when resolving; the rest keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub kind: EffectKind,

    /// 0.0 ..= 10.0
    pub intensity: f32,

    /// Pixels, 1 ..= 20
    pub blur_radius: u32,

    /// 0.1 ..= 10.0
    pub speed_factor: f32,

    /// 0.0 ..= 1.0
    pub noise_level: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            kind: EffectKind::None,
            intensity: 1.0,
            blur_radius: 2,
            speed_factor: 1.5,
            noise_level: 0.1,
        }
    }
}

impl EffectConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=10.0).contains(&self.intensity) {
            return Err(out_of_range("intensity", self.intensity));
        }
        if !(1..=20).contains(&self.blur_radius) {
            return Err(out_of_range("blur_radius", self.blur_radius));
        }
        if !(0.1..=10.0).contains(&self.speed_factor) {
            return Err(out_of_range("speed_factor", self.speed_factor));
        }
        if !(0.0..=1.0).contains(&self.noise_level) {
            return Err(out_of_range("noise_level", self.noise_level));
        }
        Ok(())
    }

    /// Validate and turn the settings into a concrete effect
    pub fn resolve(&self) -> Result<Effect> {
        self.validate()?;
        Ok(match self.kind {
            EffectKind::None => Effect::None,
            EffectKind::Blur => Effect::Blur {
                radius: self.blur_radius,
                intensity: self.intensity,
            },
            EffectKind::Sharpen => Effect::Sharpen {
                intensity: self.intensity,
            },
            EffectKind::MirrorX => Effect::MirrorX,
            EffectKind::MirrorY => Effect::MirrorY,
            EffectKind::SpeedUp => Effect::SpeedUp {
                factor: self.speed_factor,
            },
            EffectKind::SlowDown => Effect::SlowDown {
                factor: self.speed_factor,
            },
            EffectKind::Noise => Effect::Noise {
                level: self.noise_level,
            },
            EffectKind::Vignette => Effect::Vignette {
                intensity: self.intensity,
            },
        })
    }
}

fn out_of_range<V: fmt::Display>(key: &str, value: V) -> CompositorError {
    CompositorError::invalid_input(format!("effect {} out of range: {}", key, value))
}

/// A fully parameterised effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    None,
    /// Gaussian blur with sigma `radius * intensity`
    Blur { radius: u32, intensity: f32 },
    /// Unsharp mask against a sigma 1 blur
    Sharpen { intensity: f32 },
    MirrorX,
    MirrorY,
    SpeedUp { factor: f32 },
    /// Factors above 1 are inverted
    SlowDown { factor: f32 },
    /// Gaussian noise, standard deviation `level * 255`
    Noise { level: f32 },
    Vignette { intensity: f32 },
}

impl Effect {
    pub fn apply(&self, clip: &Clip) -> Result<Clip> {
        match *self {
            Effect::None => Ok(clip.clone()),
            Effect::Blur { radius, intensity } => {
                let sigma = radius as f32 * intensity;
                if sigma <= 0.0 {
                    return Ok(clip.clone());
                }
                Ok(clip.map_frames(move |frame, _| {
                    *frame = Frame::new(imageops::blur(frame.as_image(), sigma));
                    Ok(())
                }))
            }
            Effect::Sharpen { intensity } => {
                if intensity <= 0.0 {
                    return Ok(clip.clone());
                }
                Ok(clip.map_frames(move |frame, _| {
                    sharpen(frame, intensity);
                    Ok(())
                }))
            }
            Effect::MirrorX => Ok(clip.map_frames(|frame, _| {
                imageops::flip_horizontal_in_place(frame.as_image_mut());
                Ok(())
            })),
            Effect::MirrorY => Ok(clip.map_frames(|frame, _| {
                imageops::flip_vertical_in_place(frame.as_image_mut());
                Ok(())
            })),
            Effect::SpeedUp { factor } => clip.with_speed(factor as f64),
            Effect::SlowDown { factor } => {
                let factor = if factor > 1.0 { 1.0 / factor } else { factor };
                clip.with_speed(factor as f64)
            }
            Effect::Noise { level } => {
                if level <= 0.0 {
                    return Ok(clip.clone());
                }
                Ok(clip.map_frames(move |frame, _| {
                    add_noise(frame, level);
                    Ok(())
                }))
            }
            Effect::Vignette { intensity } => {
                let (width, height) = clip.size();
                let mask = Arc::new(vignette_mask(width, height, intensity));
                Ok(clip.map_frames(move |frame, _| {
                    if frame.dimensions() == (width, height) {
                        apply_mask(frame, &mask);
                    } else {
                        apply_mask(frame, &vignette_mask(frame.width(), frame.height(), intensity));
                    }
                    Ok(())
                }))
            }
        }
    }
}

fn sharpen(frame: &mut Frame, intensity: f32) {
    let blurred = imageops::blur(frame.as_image(), 1.0);
    for (value, soft) in frame.as_raw_mut().iter_mut().zip(blurred.as_raw().iter()) {
        let v = *value as f32;
        let sharpened = v + intensity * (v - *soft as f32);
        *value = sharpened.clamp(0.0, 255.0) as u8;
    }
}

fn add_noise(frame: &mut Frame, level: f32) {
    let mut rng = rand::thread_rng();
    let spread = level * 255.0;
    for value in frame.as_raw_mut().iter_mut() {
        let sample: f32 = rng.sample(StandardNormal);
        let noisy = *value as f32 + sample * spread;
        *value = noisy.clamp(0.0, 255.0) as u8;
    }
}

/// Per-pixel brightness multipliers falling off from the center
fn vignette_mask(width: u32, height: u32, intensity: f32) -> Vec<f32> {
    let axis = |i: u32, n: u32| {
        if n > 1 {
            -1.0 + 2.0 * i as f32 / (n - 1) as f32
        } else {
            0.0
        }
    };

    let mut mask = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let ny = axis(y, height);
        for x in 0..width {
            let nx = axis(x, width);
            let radius = (nx * nx + ny * ny).sqrt();
            mask.push(1.0 - (radius * intensity * 0.7).clamp(0.0, 1.0));
        }
    }
    mask
}

fn apply_mask(frame: &mut Frame, mask: &[f32]) {
    for (pixel, weight) in frame.as_raw_mut().chunks_mut(3).zip(mask.iter()) {
        for value in pixel.iter_mut() {
            *value = (*value as f32 * weight).clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_clip() -> Clip {
        let mut frame = Frame::new_black(8, 4);
        for x in 0..8 {
            for y in 0..4 {
                frame.set_pixel(x, y, [(x * 30) as u8, (y * 60) as u8, 100]);
            }
        }
        Clip::still(frame, 2.0, 10.0).unwrap()
    }

    #[test]
    fn test_parse_effect_kind() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.as_str().parse::<EffectKind>().unwrap(), kind);
        }
        assert!(matches!(
            "sepia".parse::<EffectKind>(),
            Err(CompositorError::UnknownEffectKind { .. })
        ));
    }

    #[test]
    fn test_resolve_picks_relevant_fields() {
        let config = EffectConfig {
            kind: EffectKind::Blur,
            intensity: 0.5,
            blur_radius: 4,
            ..EffectConfig::default()
        };
        assert_eq!(
            config.resolve().unwrap(),
            Effect::Blur {
                radius: 4,
                intensity: 0.5
            }
        );

        let config = EffectConfig {
            kind: EffectKind::Noise,
            noise_level: 0.3,
            ..EffectConfig::default()
        };
        assert_eq!(config.resolve().unwrap(), Effect::Noise { level: 0.3 });
    }

    #[test]
    fn test_resolve_rejects_out_of_range() {
        let config = EffectConfig {
            kind: EffectKind::Blur,
            blur_radius: 0,
            ..EffectConfig::default()
        };
        assert!(config.resolve().is_err());

        let config = EffectConfig {
            speed_factor: 20.0,
            ..EffectConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_none_returns_same_clip() {
        let clip = gradient_clip();
        assert!(Effect::None.apply(&clip).unwrap().same_source(&clip));
    }

    #[test]
    fn test_mirrors() {
        let clip = gradient_clip();
        let mirrored = Effect::MirrorX.apply(&clip).unwrap().frame_at(0.0).unwrap();
        assert_eq!(mirrored.get_pixel(0, 0), [210, 0, 100]);

        let flipped = Effect::MirrorY.apply(&clip).unwrap().frame_at(0.0).unwrap();
        assert_eq!(flipped.get_pixel(0, 0), [0, 180, 100]);
    }

    #[test]
    fn test_speed_changes_duration() {
        let clip = gradient_clip();
        let fast = Effect::SpeedUp { factor: 2.0 }.apply(&clip).unwrap();
        assert!((fast.duration() - 1.0).abs() < 1e-9);

        // A slow-down factor above one is inverted
        let slow = Effect::SlowDown { factor: 2.0 }.apply(&clip).unwrap();
        assert!((slow.duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_blur_keeps_size_and_softens() {
        let mut frame = Frame::new_black(9, 9);
        frame.set_pixel(4, 4, [255, 255, 255]);
        let clip = Clip::still(frame, 1.0, 10.0).unwrap();

        let blurred = Effect::Blur {
            radius: 2,
            intensity: 1.0,
        }
        .apply(&clip)
        .unwrap()
        .frame_at(0.0)
        .unwrap();
        assert_eq!(blurred.dimensions(), (9, 9));
        assert!(blurred.get_pixel(4, 4)[0] < 255);
    }

    #[test]
    fn test_vignette_darkens_corners() {
        let clip = Clip::solid([200, 200, 200], (9, 9), 1.0, 10.0).unwrap();
        let frame = Effect::Vignette { intensity: 1.0 }
            .apply(&clip)
            .unwrap()
            .frame_at(0.0)
            .unwrap();
        assert_eq!(frame.get_pixel(4, 4), [200, 200, 200]);
        assert!(frame.get_pixel(0, 0)[0] < 100);
    }

    #[test]
    fn test_noise_stays_in_range_and_changes_pixels() {
        let clip = Clip::solid([128, 128, 128], (16, 16), 1.0, 10.0).unwrap();
        let frame = Effect::Noise { level: 0.5 }
            .apply(&clip)
            .unwrap()
            .frame_at(0.0)
            .unwrap();
        assert!(frame.as_raw().iter().any(|v| *v != 128));
    }

    #[test]
    fn test_noise_spread_follows_level() {
        let clip = Clip::solid([128, 128, 128], (64, 64), 1.0, 10.0).unwrap();
        let frame = Effect::Noise { level: 0.05 }
            .apply(&clip)
            .unwrap()
            .frame_at(0.0)
            .unwrap();

        let values: Vec<f64> = frame.as_raw().iter().map(|v| *v as f64).collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        // Gaussian with sigma = level * 255, centred on the input
        assert!((mean - 128.0).abs() < 2.0, "mean {}", mean);
        assert!(std_dev > 10.5 && std_dev < 15.0, "std dev {}", std_dev);
    }

    #[test]
    fn test_sharpen_preserves_flat_areas() {
        let clip = Clip::solid([90, 90, 90], (6, 6), 1.0, 10.0).unwrap();
        let frame = Effect::Sharpen { intensity: 2.0 }
            .apply(&clip)
            .unwrap()
            .frame_at(0.0)
            .unwrap();
        assert_eq!(frame.get_pixel(3, 3), [90, 90, 90]);
    }
}
