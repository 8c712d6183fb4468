use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CompositorError, Result},
    video::{Clip, Frame},
};

/// Per-pixel color adjustments
///
/// Every field has a neutral value (0.0, or 1.0 for gamma) at which it does
/// nothing. Adjustments run in a fixed order: brightness, contrast, gamma,
/// then saturation and hue together in HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGrading {
    /// -1.0 ..= 1.0, added as a fraction of full scale
    pub brightness: f32,

    /// -1.0 ..= 1.0, spread around the frame mean
    pub contrast: f32,

    /// -1.0 ..= 1.0, scales HSV saturation by `1 + saturation`
    pub saturation: f32,

    /// 0.1 ..= 3.0
    pub gamma: f32,

    /// Degrees, -180.0 ..= 180.0
    pub hue_shift: f32,
}

impl Default for ColorGrading {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            gamma: 1.0,
            hue_shift: 0.0,
        }
    }
}

impl ColorGrading {
    pub fn validate(&self) -> Result<()> {
        check_range("brightness", self.brightness, -1.0, 1.0)?;
        check_range("contrast", self.contrast, -1.0, 1.0)?;
        check_range("saturation", self.saturation, -1.0, 1.0)?;
        check_range("gamma", self.gamma, 0.1, 3.0)?;
        check_range("hue_shift", self.hue_shift, -180.0, 180.0)?;
        Ok(())
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Grade every frame of `clip`; a neutral grading returns the clip untouched
    pub fn apply(&self, clip: &Clip) -> Result<Clip> {
        self.validate()?;
        if self.is_neutral() {
            return Ok(clip.clone());
        }
        let grading = *self;
        Ok(clip.map_frames(move |frame, _| {
            grading.grade_frame(frame);
            Ok(())
        }))
    }

    /// Apply the adjustments to one frame in place
    pub fn grade_frame(&self, frame: &mut Frame) {
        if self.brightness != 0.0 {
            let offset = self.brightness * 255.0;
            map_samples(frame, |v| v + offset);
        }

        if self.contrast != 0.0 {
            let factor = 1.0 + self.contrast;
            let mean = frame.mean();
            map_samples(frame, |v| (v - mean) * factor + mean);
        }

        if self.gamma != 1.0 {
            let exponent = 1.0 / self.gamma;
            map_samples(frame, |v| (v / 255.0).powf(exponent) * 255.0);
        }

        if self.saturation != 0.0 || self.hue_shift != 0.0 {
            let saturation = 1.0 + self.saturation as f64;
            let hue_shift = self.hue_shift as f64 / 360.0;
            frame.as_raw_mut().par_chunks_mut(3).for_each(|pixel| {
                let (h, s, v) = rgb_to_hsv(
                    pixel[0] as f64 / 255.0,
                    pixel[1] as f64 / 255.0,
                    pixel[2] as f64 / 255.0,
                );
                let s = (s * saturation).clamp(0.0, 1.0);
                let h = (h + hue_shift).rem_euclid(1.0);
                let (r, g, b) = hsv_to_rgb(h, s, v);
                pixel[0] = (r * 255.0).clamp(0.0, 255.0) as u8;
                pixel[1] = (g * 255.0).clamp(0.0, 255.0) as u8;
                pixel[2] = (b * 255.0).clamp(0.0, 255.0) as u8;
            });
        }
    }
}

fn check_range(key: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(CompositorError::invalid_input(format!(
            "{} must be within {}..={}, got {}",
            key, min, max, value
        )));
    }
    Ok(())
}

/// Apply `f` to every sample, clamping and truncating back to 8 bits
fn map_samples<F>(frame: &mut Frame, f: F)
where
    F: Fn(f32) -> f32 + Sync,
{
    frame
        .as_raw_mut()
        .par_iter_mut()
        .for_each(|v| *v = f(*v as f32).clamp(0.0, 255.0) as u8);
}

/// RGB in `[0, 1]` to `(hue, saturation, value)`, all in `[0, 1]`
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if max == min {
        return (0.0, 0.0, v);
    }

    let delta = max - min;
    let s = delta / max;
    let rc = (max - r) / delta;
    let gc = (max - g) / delta;
    let bc = (max - b) / delta;

    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    ((h / 6.0).rem_euclid(1.0), s, v)
}

/// `(hue, saturation, value)` in `[0, 1]` back to RGB in `[0, 1]`
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }

    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [u8; 3], b: [u8; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (*x as i16 - *y as i16).abs() <= 1)
    }

    #[test]
    fn test_default_is_neutral_and_valid() {
        let grading = ColorGrading::default();
        assert!(grading.is_neutral());
        assert!(grading.validate().is_ok());

        let clip = Clip::solid([10, 20, 30], (4, 4), 1.0, 10.0).unwrap();
        assert!(grading.apply(&clip).unwrap().same_source(&clip));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let grading = ColorGrading {
            gamma: 0.0,
            ..ColorGrading::default()
        };
        assert!(matches!(
            grading.validate(),
            Err(CompositorError::InvalidInput { .. })
        ));

        let grading = ColorGrading {
            hue_shift: 270.0,
            ..ColorGrading::default()
        };
        assert!(grading.validate().is_err());
    }

    #[test]
    fn test_brightness() {
        let mut frame = Frame::new_filled(2, 2, [100, 200, 250]);
        ColorGrading {
            brightness: 0.2,
            ..ColorGrading::default()
        }
        .grade_frame(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), [151, 251, 255]);
    }

    #[test]
    fn test_contrast_spreads_around_mean() {
        let mut frame = Frame::new_filled(2, 1, [100, 100, 100]);
        frame.set_pixel(1, 0, [200, 200, 200]);
        ColorGrading {
            contrast: 1.0,
            ..ColorGrading::default()
        }
        .grade_frame(&mut frame);
        assert_eq!(frame.get_pixel(0, 0), [50, 50, 50]);
        assert_eq!(frame.get_pixel(1, 0), [250, 250, 250]);
    }

    #[test]
    fn test_gamma_brightens_midtones() {
        let mut frame = Frame::new_filled(1, 1, [64, 128, 255]);
        ColorGrading {
            gamma: 2.0,
            ..ColorGrading::default()
        }
        .grade_frame(&mut frame);
        let pixel = frame.get_pixel(0, 0);
        assert!(pixel[0] > 64 && pixel[1] > 128);
        assert_eq!(pixel[2], 255);
    }

    #[test]
    fn test_hue_shift_rotates_primaries() {
        let mut frame = Frame::new_filled(1, 1, [255, 0, 0]);
        ColorGrading {
            hue_shift: 120.0,
            ..ColorGrading::default()
        }
        .grade_frame(&mut frame);
        assert!(close(frame.get_pixel(0, 0), [0, 255, 0]));
    }

    #[test]
    fn test_desaturate_to_grey() {
        let mut frame = Frame::new_filled(1, 1, [200, 100, 50]);
        ColorGrading {
            saturation: -1.0,
            ..ColorGrading::default()
        }
        .grade_frame(&mut frame);
        assert!(close(frame.get_pixel(0, 0), [200, 200, 200]));
    }

    #[test]
    fn test_hsv_roundtrip_on_known_colors() {
        let (h, s, v) = rgb_to_hsv(0.0, 0.0, 1.0);
        assert!((h - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!((s, v), (1.0, 1.0));

        let (r, g, b) = hsv_to_rgb(h, s, v);
        assert!(r.abs() < 1e-9 && g.abs() < 1e-9 && (b - 1.0).abs() < 1e-9);
    }
}
