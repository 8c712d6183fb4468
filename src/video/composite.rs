//! Layered compositing and sequential concatenation of clips.

use rayon::prelude::*;

use crate::error::{CompositorError, Result};
use crate::video::clip::{Clip, FrameSource, TIME_EPSILON};
use crate::video::types::Frame;

/// Where a layer's frame sits on the canvas
///
/// `offset` is in canvas pixels; `scale` is applied about the canvas center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub offset: (f64, f64),
    pub scale: f64,
}

impl Placement {
    pub const IDENTITY: Placement = Placement {
        offset: (0.0, 0.0),
        scale: 1.0,
    };

    pub fn shifted(dx: f64, dy: f64) -> Self {
        Self {
            offset: (dx, dy),
            scale: 1.0,
        }
    }

    pub fn scaled(scale: f64) -> Self {
        Self {
            offset: (0.0, 0.0),
            scale,
        }
    }

    fn lerp(&self, other: &Placement, progress: f64) -> Placement {
        let mix = |a: f64, b: f64| a + (b - a) * progress;
        Placement {
            offset: (
                mix(self.offset.0, other.offset.0),
                mix(self.offset.1, other.offset.1),
            ),
            scale: mix(self.scale, other.scale),
        }
    }

    fn is_identity(&self) -> bool {
        self.offset.0.abs() < 0.5 && self.offset.1.abs() < 0.5 && (self.scale - 1.0).abs() < 1e-6
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Linear interpolation between two placements over a local time window
///
/// Before `start` the layer sits at `from`, after `end` at `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub start: f64,
    pub end: f64,
    pub from: Placement,
    pub to: Placement,
}

impl Motion {
    pub fn still() -> Self {
        Self::linear(0.0, 0.0, Placement::IDENTITY, Placement::IDENTITY)
    }

    pub fn linear(start: f64, end: f64, from: Placement, to: Placement) -> Self {
        Self { start, end, from, to }
    }

    pub fn placement_at(&self, t: f64) -> Placement {
        if t <= self.start {
            return self.from;
        }
        if t >= self.end || self.end - self.start <= TIME_EPSILON {
            return self.to;
        }
        let progress = (t - self.start) / (self.end - self.start);
        self.from.lerp(&self.to, progress)
    }
}

impl Default for Motion {
    fn default() -> Self {
        Self::still()
    }
}

/// A clip placed on a composite timeline
#[derive(Debug, Clone)]
pub struct Layer {
    pub clip: Clip,
    /// Timeline time at which the layer's first frame is shown
    pub start: f64,
    /// Opacity ramps from 0 to 1 over this many seconds at the layer's start
    pub fade_in: f64,
    /// Opacity ramps from 1 to 0 over this many seconds at the layer's end
    pub fade_out: f64,
    pub motion: Motion,
}

impl Layer {
    pub fn new(clip: Clip, start: f64) -> Self {
        Self {
            clip,
            start,
            fade_in: 0.0,
            fade_out: 0.0,
            motion: Motion::still(),
        }
    }

    pub fn with_fade_in(mut self, duration: f64) -> Self {
        self.fade_in = duration.max(0.0);
        self
    }

    pub fn with_fade_out(mut self, duration: f64) -> Self {
        self.fade_out = duration.max(0.0);
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn end(&self) -> f64 {
        self.start + self.clip.duration()
    }

    /// Opacity at layer-local time `t`
    pub fn opacity_at(&self, t: f64) -> f64 {
        let duration = self.clip.duration();
        let mut opacity = 1.0;
        if self.fade_in > TIME_EPSILON && t < self.fade_in {
            opacity *= t / self.fade_in;
        }
        if self.fade_out > TIME_EPSILON {
            let fade_start = duration - self.fade_out;
            if t > fade_start {
                opacity *= (duration - t) / self.fade_out;
            }
        }
        opacity.clamp(0.0, 1.0)
    }

    fn is_active(&self, t: f64, timeline_end: f64) -> bool {
        let end = self.end();
        if t < self.start - TIME_EPSILON {
            return false;
        }
        // The last instant of the timeline belongs to the layers that reach it
        t < end || (t >= timeline_end - TIME_EPSILON && end >= timeline_end - TIME_EPSILON)
    }
}

/// Stack layers on a canvas of `size`, later layers drawn over earlier ones
///
/// The result lasts until the last layer ends and runs at the highest layer
/// frame rate. Areas no layer covers show `background`.
pub fn compose(layers: Vec<Layer>, size: (u32, u32), background: [u8; 3]) -> Result<Clip> {
    if layers.is_empty() {
        return Err(CompositorError::invalid_input("cannot compose zero layers"));
    }
    if size.0 == 0 || size.1 == 0 {
        return Err(CompositorError::invalid_input(format!(
            "invalid canvas size {}x{}",
            size.0, size.1
        )));
    }
    if let Some(layer) = layers.iter().find(|layer| !layer.start.is_finite() || layer.start < 0.0) {
        return Err(CompositorError::invalid_input(format!(
            "layer start must be non-negative, got {}",
            layer.start
        )));
    }

    let duration = layers.iter().map(Layer::end).fold(0.0, f64::max);
    let fps = layers.iter().map(|layer| layer.clip.fps()).fold(0.0, f64::max);

    Ok(Clip::new(CompositeSource {
        layers,
        size,
        fps,
        duration,
        background,
    }))
}

/// Play clips back to back with no overlap
///
/// A single clip is returned unchanged. The canvas is the element-wise
/// maximum of the clip sizes; smaller clips are centered on black.
pub fn concatenate(clips: &[Clip]) -> Result<Clip> {
    match clips {
        [] => Err(CompositorError::invalid_input("cannot concatenate an empty clip sequence")),
        [single] => Ok(single.clone()),
        _ => {
            let mut starts = Vec::with_capacity(clips.len());
            let mut cursor = 0.0;
            for clip in clips {
                starts.push(cursor);
                cursor += clip.duration();
            }

            Ok(Clip::new(SequenceSource {
                clips: clips.to_vec(),
                starts,
                duration: cursor,
                fps: clips.iter().map(Clip::fps).fold(0.0, f64::max),
                size: canvas_size(clips),
            }))
        }
    }
}

/// Element-wise maximum of the clip sizes
pub fn canvas_size(clips: &[Clip]) -> (u32, u32) {
    clips.iter().fold((0, 0), |(width, height), clip| {
        (width.max(clip.width()), height.max(clip.height()))
    })
}

struct CompositeSource {
    layers: Vec<Layer>,
    size: (u32, u32),
    fps: f64,
    duration: f64,
    background: [u8; 3],
}

impl FrameSource for CompositeSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let mut canvas = Frame::new_filled(self.size.0, self.size.1, self.background);

        for layer in self.layers.iter().filter(|layer| layer.is_active(t, self.duration)) {
            let local = (t - layer.start).clamp(0.0, layer.clip.duration());
            let opacity = layer.opacity_at(local);
            if opacity <= 0.0 {
                continue;
            }
            let frame = layer.clip.frame_at(local)?;
            draw(&mut canvas, &frame, layer.motion.placement_at(local), opacity);
        }

        Ok(canvas)
    }
}

struct SequenceSource {
    clips: Vec<Clip>,
    starts: Vec<f64>,
    duration: f64,
    fps: f64,
    size: (u32, u32),
}

impl FrameSource for SequenceSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        // Last clip whose start is at or before t
        let index = self
            .starts
            .partition_point(|start| *start <= t + TIME_EPSILON)
            .saturating_sub(1);
        let clip = &self.clips[index];
        let frame = clip.frame_at(t - self.starts[index])?;

        if frame.dimensions() == self.size {
            return Ok(frame);
        }
        let mut canvas = Frame::new_black(self.size.0, self.size.1);
        draw(&mut canvas, &frame, Placement::IDENTITY, 1.0);
        Ok(canvas)
    }
}

/// Blend `source` onto `canvas` with nearest-neighbour sampling
///
/// The source is centered on the canvas, then shifted and scaled by
/// `placement`. Pixels that map outside the source are left untouched.
pub fn draw(canvas: &mut Frame, source: &Frame, placement: Placement, opacity: f64) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || placement.scale <= 0.0 {
        return;
    }

    if opacity >= 1.0 && placement.is_identity() && canvas.dimensions() == source.dimensions() {
        canvas.as_raw_mut().copy_from_slice(source.as_raw());
        return;
    }

    let (canvas_width, canvas_height) = canvas.dimensions();
    let (source_width, source_height) = source.dimensions();
    let canvas_center = (canvas_width as f64 / 2.0, canvas_height as f64 / 2.0);
    let source_center = (source_width as f64 / 2.0, source_height as f64 / 2.0);
    let source_image = source.as_image();
    let row_len = canvas_width as usize * 3;
    let alpha = opacity as f32;

    canvas
        .as_raw_mut()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let dest_y = y as f64 + 0.5;
            let sy = (dest_y - placement.offset.1 - canvas_center.1) / placement.scale + source_center.1;
            if sy < 0.0 || sy >= source_height as f64 {
                return;
            }
            let sy = sy as u32;

            for x in 0..canvas_width as usize {
                let dest_x = x as f64 + 0.5;
                let sx = (dest_x - placement.offset.0 - canvas_center.0) / placement.scale + source_center.0;
                if sx < 0.0 || sx >= source_width as f64 {
                    continue;
                }
                let pixel = source_image.get_pixel(sx as u32, sy);
                let target = &mut row[x * 3..x * 3 + 3];
                for c in 0..3 {
                    let blended = target[c] as f32 * (1.0 - alpha) + pixel[c] as f32 * alpha;
                    target[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::BLACK;

    fn solid(color: [u8; 3], duration: f64) -> Clip {
        Clip::solid(color, (8, 4), duration, 10.0).unwrap()
    }

    #[test]
    fn test_concatenate_durations_and_lookup() {
        let red = solid([255, 0, 0], 1.0);
        let green = solid([0, 255, 0], 2.0);
        let blue = solid([0, 0, 255], 0.5);

        let joined = concatenate(&[red, green, blue]).unwrap();
        assert!((joined.duration() - 3.5).abs() < TIME_EPSILON);
        assert_eq!(joined.frame_at(0.5).unwrap().get_pixel(0, 0), [255, 0, 0]);
        assert_eq!(joined.frame_at(1.0).unwrap().get_pixel(0, 0), [0, 255, 0]);
        assert_eq!(joined.frame_at(3.2).unwrap().get_pixel(0, 0), [0, 0, 255]);
        assert_eq!(joined.frame_at(3.5).unwrap().get_pixel(0, 0), [0, 0, 255]);
    }

    #[test]
    fn test_concatenate_single_and_empty() {
        let clip = solid([1, 2, 3], 1.0);
        assert!(concatenate(&[clip.clone()]).unwrap().same_source(&clip));
        assert!(concatenate(&[]).is_err());
    }

    #[test]
    fn test_concatenate_centers_smaller_clips() {
        let wide = Clip::solid([9, 9, 9], (8, 4), 1.0, 10.0).unwrap();
        let small = Clip::solid([200, 200, 200], (4, 2), 1.0, 10.0).unwrap();

        let joined = concatenate(&[wide, small]).unwrap();
        assert_eq!(joined.size(), (8, 4));
        let frame = joined.frame_at(1.5).unwrap();
        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(frame.get_pixel(0, 0), BLACK);
        assert_eq!(frame.get_pixel(4, 2), [200, 200, 200]);
    }

    #[test]
    fn test_layer_opacity_ramps() {
        let layer = Layer::new(solid(BLACK, 3.0), 0.0)
            .with_fade_in(1.0)
            .with_fade_out(1.0);
        assert_eq!(layer.opacity_at(0.0), 0.0);
        assert!((layer.opacity_at(0.5) - 0.5).abs() < 1e-9);
        assert_eq!(layer.opacity_at(1.5), 1.0);
        assert!((layer.opacity_at(2.75) - 0.25).abs() < 1e-9);
        assert_eq!(layer.opacity_at(3.0), 0.0);
    }

    #[test]
    fn test_compose_overlap_blends() {
        let white = Layer::new(solid([200, 200, 200], 2.0), 0.0);
        let black = Layer::new(solid(BLACK, 2.0), 1.0).with_fade_in(1.0);

        let composite = compose(vec![white, black], (8, 4), BLACK).unwrap();
        assert!((composite.duration() - 3.0).abs() < TIME_EPSILON);
        assert_eq!(composite.frame_at(0.5).unwrap().get_pixel(3, 3), [200, 200, 200]);
        assert_eq!(composite.frame_at(1.5).unwrap().get_pixel(3, 3), [100, 100, 100]);
        assert_eq!(composite.frame_at(2.5).unwrap().get_pixel(3, 3), BLACK);
    }

    #[test]
    fn test_draw_with_offset() {
        let mut canvas = Frame::new_black(8, 4);
        let source = Frame::new_filled(8, 4, [50, 60, 70]);
        draw(&mut canvas, &source, Placement::shifted(4.0, 0.0), 1.0);

        assert_eq!(canvas.get_pixel(3, 1), BLACK);
        assert_eq!(canvas.get_pixel(4, 1), [50, 60, 70]);
        assert_eq!(canvas.get_pixel(7, 3), [50, 60, 70]);
    }

    #[test]
    fn test_draw_scaled_covers_canvas() {
        let mut canvas = Frame::new_black(8, 8);
        let mut source = Frame::new_filled(8, 8, [10, 10, 10]);
        source.set_pixel(4, 4, [250, 250, 250]);
        draw(&mut canvas, &source, Placement::scaled(2.0), 1.0);

        // Zooming in about the center enlarges the center pixel to 2x2
        assert_eq!(canvas.get_pixel(4, 4), [250, 250, 250]);
        assert_eq!(canvas.get_pixel(5, 5), [250, 250, 250]);
        assert_eq!(canvas.get_pixel(0, 0), [10, 10, 10]);
    }

    #[test]
    fn test_motion_interpolates() {
        let motion = Motion::linear(1.0, 3.0, Placement::IDENTITY, Placement::shifted(-100.0, 0.0));
        assert_eq!(motion.placement_at(0.0), Placement::IDENTITY);
        assert_eq!(motion.placement_at(2.0).offset, (-50.0, 0.0));
        assert_eq!(motion.placement_at(5.0).offset, (-100.0, 0.0));
    }
}
