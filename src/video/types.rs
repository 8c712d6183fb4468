use image::{ImageBuffer, Rgb, RgbImage};

/// Solid black, the default compositing background
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Solid white
pub const WHITE: [u8; 3] = [255, 255, 255];

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer that provides
/// convenient methods for pixel manipulation used by effects and transitions.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Frame size as `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Raw interleaved RGB samples, row-major
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Mutable raw interleaved RGB samples, row-major
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Create a frame from normalized `[0, 1]` samples laid out as height x width x 3
    ///
    /// Values outside the unit range are clamped.
    pub fn from_normalized(width: u32, height: u32, data: &[f32]) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        let bytes = data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();
        Self::from_rgb_bytes(width, height, bytes)
    }

    /// Convert the frame to normalized `[0, 1]` samples, height x width x 3
    pub fn to_normalized(&self) -> Vec<f32> {
        self.buffer.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
    }

    /// Mean sample value over every channel of every pixel
    pub fn mean(&self) -> f32 {
        let raw = self.buffer.as_raw();
        if raw.is_empty() {
            return 0.0;
        }
        let total: u64 = raw.iter().map(|&v| v as u64).sum();
        total as f32 / raw.len() as f32
    }

    /// Move every pixel toward `color` by `amount` (0.0 = unchanged, 1.0 = solid color)
    pub fn fade_toward(&mut self, color: [u8; 3], amount: f32) {
        let amount = amount.clamp(0.0, 1.0);
        if amount <= 0.0 {
            return;
        }
        for pixel in self.buffer.pixels_mut() {
            for c in 0..3 {
                let value = pixel[c] as f32 * (1.0 - amount) + color[c] as f32 * amount;
                pixel[c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_conversion() {
        let frame = Frame::new_filled(2, 2, [255, 0, 51]);
        let normalized = frame.to_normalized();
        assert_eq!(normalized.len(), 12);
        assert_eq!(normalized[0], 1.0);
        assert_eq!(normalized[1], 0.0);
        assert!((normalized[2] - 0.2).abs() < 1e-6);

        let back = Frame::from_normalized(2, 2, &normalized).unwrap();
        assert_eq!(back.get_pixel(1, 1), [255, 0, 51]);
    }

    #[test]
    fn test_from_normalized_rejects_wrong_length() {
        assert!(Frame::from_normalized(4, 4, &[0.5; 10]).is_none());
    }

    #[test]
    fn test_fade_toward() {
        let mut frame = Frame::new_filled(3, 3, [100, 100, 100]);
        frame.fade_toward(WHITE, 0.5);
        assert_eq!(frame.get_pixel(0, 0), [178, 178, 178]);

        frame.fade_toward(BLACK, 1.0);
        assert_eq!(frame.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn test_mean() {
        let frame = Frame::new_filled(4, 2, [0, 30, 60]);
        assert!((frame.mean() - 30.0).abs() < 1e-6);
    }
}
