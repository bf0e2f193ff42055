//! Drawable RGBA surface
//!
//! The overlay loop composites the camera frame and detection markers here;
//! the recorder captures the result as a live video track.

pub mod draw;
pub mod stream;

use crate::capture::VideoFrame;
use parking_lot::RwLock;
use std::sync::Arc;

pub use draw::draw_detections;
pub use stream::{capture_stream, SurfaceStream};

/// Surface shared between the overlay loop (sole writer) and its readers
pub type SharedSurface = Arc<RwLock<Surface>>;

/// Create an empty shared surface
pub fn shared_surface() -> SharedSurface {
    Arc::new(RwLock::new(Surface::new()))
}

/// RGBA pixel buffer with basic drawing operations
#[derive(Debug, Clone, Default)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    composites: u64,
}

impl Surface {
    /// An empty 0x0 surface
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of completed composites drawn so far
    pub fn composites(&self) -> u64 {
        self.composites
    }

    /// Whether at least one composite has been drawn
    pub fn has_content(&self) -> bool {
        self.composites > 0 && self.width > 0 && self.height > 0
    }

    /// Resize to the given dimensions; returns true if they changed
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
        true
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Draw a frame covering the whole surface
    ///
    /// Frames with other dimensions are scaled nearest-neighbor.
    pub fn draw_frame(&mut self, frame: &VideoFrame) {
        if !frame.is_valid() || self.width == 0 || self.height == 0 {
            return;
        }

        if frame.width == self.width && frame.height == self.height {
            self.pixels.copy_from_slice(&frame.data);
            return;
        }

        let (dst_w, dst_h) = (self.width as usize, self.height as usize);
        let (src_w, src_h) = (frame.width as usize, frame.height as usize);
        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                let src = (sy * src_w + sx) * 4;
                let dst = (y * dst_w + x) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
            }
        }
    }

    /// Blend one pixel (source-over); out-of-bounds coordinates are ignored
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = ((y as usize) * self.width as usize + x as usize) * 4;
        let alpha = color[3] as u32;
        if alpha == 255 {
            self.pixels[idx..idx + 4].copy_from_slice(&color);
            return;
        }
        let inv = 255 - alpha;
        for c in 0..3 {
            let dst = self.pixels[idx + c] as u32;
            self.pixels[idx + c] = ((color[c] as u32 * alpha + dst * inv) / 255) as u8;
        }
        let dst_a = self.pixels[idx + 3] as u32;
        self.pixels[idx + 3] = (alpha + dst_a * inv / 255).min(255) as u8;
    }

    /// Mark the current drawing as a finished composite
    pub fn finish_composite(&mut self) {
        self.composites += 1;
    }

    /// Copy the current pixels out as a frame
    pub fn snapshot(&self) -> VideoFrame {
        VideoFrame::new(self.width, self.height, self.pixels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_reports_change_only_once() {
        let mut surface = Surface::new();
        assert!(surface.resize(4, 4));
        assert!(!surface.resize(4, 4));
        assert_eq!(surface.pixels().len(), 64);
    }

    #[test]
    fn test_draw_frame_scales_to_surface() {
        let mut surface = Surface::new();
        surface.resize(4, 4);
        surface.draw_frame(&VideoFrame::solid(2, 2, [9, 8, 7, 255]));

        let snapshot = surface.snapshot();
        assert_eq!(snapshot.pixel(3, 3), Some([9, 8, 7, 255]));
        assert_eq!(snapshot.pixel(0, 0), Some([9, 8, 7, 255]));
    }

    #[test]
    fn test_blend_half_transparent_pixel() {
        let mut surface = Surface::new();
        surface.resize(1, 1);
        surface.draw_frame(&VideoFrame::solid(1, 1, [0, 0, 0, 255]));
        surface.blend_pixel(0, 0, [255, 255, 255, 128]);

        let px = surface.snapshot().pixel(0, 0).unwrap();
        assert_eq!(px[0], 128);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_has_content_after_composite() {
        let mut surface = Surface::new();
        assert!(!surface.has_content());
        surface.resize(2, 2);
        assert!(!surface.has_content());
        surface.finish_composite();
        assert!(surface.has_content());
    }
}
