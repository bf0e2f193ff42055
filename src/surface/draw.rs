//! Detection overlay drawing
//!
//! Boxes, landmark dots and, for the standard 68-point shape, the contour
//! lines connecting landmarks of the same facial feature.

use super::Surface;
use crate::config::OverlayConfig;
use crate::detection::{BoundingBox, Detection, Point};

/// Landmark index ranges of the 68-point shape: (start, end inclusive, closed)
const FACE_68_CONTOURS: [(usize, usize, bool); 9] = [
    (0, 16, false),  // jaw
    (17, 21, false), // left brow
    (22, 26, false), // right brow
    (27, 30, false), // nose bridge
    (30, 35, true),  // nostrils
    (36, 41, true),  // left eye
    (42, 47, true),  // right eye
    (48, 59, true),  // outer lip
    (60, 67, true),  // inner lip
];

/// Draw all detections in order on top of the current surface contents
pub fn draw_detections(surface: &mut Surface, detections: &[Detection], config: &OverlayConfig) {
    for detection in detections {
        stroke_box(surface, &detection.bounding_box, config.box_color, config.line_width);

        if detection.landmarks.len() == 68 {
            for &(start, end, closed) in FACE_68_CONTOURS.iter() {
                let points = &detection.landmarks[start..=end];
                for pair in points.windows(2) {
                    draw_line(surface, pair[0], pair[1], config.landmark_color);
                }
                if closed {
                    draw_line(surface, points[points.len() - 1], points[0], config.landmark_color);
                }
            }
        }

        for point in &detection.landmarks {
            fill_circle(surface, *point, config.landmark_radius, config.landmark_color);
        }
    }
}

/// Outline a box with the given stroke width (drawn inward)
pub fn stroke_box(surface: &mut Surface, bbox: &BoundingBox, color: [u8; 4], line_width: u32) {
    let left = bbox.x.round() as i64;
    let top = bbox.y.round() as i64;
    let right = (bbox.x + bbox.width).round() as i64 - 1;
    let bottom = (bbox.y + bbox.height).round() as i64 - 1;
    if right < left || bottom < top {
        return;
    }

    for inset in 0..line_width.max(1) as i64 {
        let (l, t, r, b) = (left + inset, top + inset, right - inset, bottom - inset);
        if r < l || b < t {
            break;
        }
        for x in l..=r {
            surface.blend_pixel(x, t, color);
            surface.blend_pixel(x, b, color);
        }
        for y in t..=b {
            surface.blend_pixel(l, y, color);
            surface.blend_pixel(r, y, color);
        }
    }
}

/// Bresenham line between two points
pub fn draw_line(surface: &mut Surface, from: Point, to: Point, color: [u8; 4]) {
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        surface.blend_pixel(x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Filled disc centered on a point
pub fn fill_circle(surface: &mut Surface, center: Point, radius: u32, color: [u8; 4]) {
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
    let r = radius as i64;
    for y in -r..=r {
        for x in -r..=r {
            if x * x + y * y <= r * r {
                surface.blend_pixel(cx + x, cy + y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::VideoFrame;

    fn blank(width: u32, height: u32) -> Surface {
        let mut surface = Surface::new();
        surface.resize(width, height);
        surface.draw_frame(&VideoFrame::solid(width, height, [0, 0, 0, 255]));
        surface
    }

    #[test]
    fn test_box_outline_leaves_interior() {
        let mut surface = blank(10, 10);
        let bbox = BoundingBox {
            x: 2.0,
            y: 2.0,
            width: 6.0,
            height: 6.0,
        };
        stroke_box(&mut surface, &bbox, [255, 0, 0, 255], 1);

        let frame = surface.snapshot();
        assert_eq!(frame.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(7, 7), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(4, 4), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_box_partially_outside_is_clipped() {
        let mut surface = blank(4, 4);
        let bbox = BoundingBox {
            x: -3.0,
            y: -3.0,
            width: 20.0,
            height: 20.0,
        };
        stroke_box(&mut surface, &bbox, [255, 0, 0, 255], 2);
        assert_eq!(surface.snapshot().pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_line_hits_both_endpoints() {
        let mut surface = blank(8, 8);
        draw_line(&mut surface, Point::new(0.0, 0.0), Point::new(7.0, 3.0), [0, 255, 0, 255]);

        let frame = surface.snapshot();
        assert_eq!(frame.pixel(0, 0), Some([0, 255, 0, 255]));
        assert_eq!(frame.pixel(7, 3), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_68_point_detection_draws_contours() {
        let mut surface = blank(100, 100);
        let landmarks = (0..68)
            .map(|i| Point::new(10.0 + (i % 10) as f32 * 8.0, 10.0 + (i / 10) as f32 * 8.0))
            .collect();
        let detection = Detection {
            bounding_box: BoundingBox {
                x: 5.0,
                y: 5.0,
                width: 90.0,
                height: 90.0,
            },
            score: 0.9,
            landmarks,
        };
        let config = OverlayConfig::default();
        draw_detections(&mut surface, &[detection], &config);

        let frame = surface.snapshot();
        // midpoint between landmark 0 (10,10) and 1 (18,10) lies on the jaw line
        assert_eq!(frame.pixel(14, 10), Some(config.landmark_color));
        assert_eq!(frame.pixel(5, 5), Some(config.box_color));
    }
}
