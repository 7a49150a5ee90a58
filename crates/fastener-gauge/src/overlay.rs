//! Drawing on frames with `imageproc`.

use crate::core::RoiConfig;
use crate::pipeline::Measurement;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use nalgebra::Point2;

pub const ROI_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DIMENSION_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const PICK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Offset of the dimension lines from the box edges, in pixels.
const DIMENSION_OFFSET: f32 = 20.0;

fn draw_polyline(img: &mut RgbImage, pts: &[Point2<f32>], closed: bool, color: Rgb<u8>) {
    for pair in pts.windows(2) {
        draw_line_segment_mut(img, (pair[0].x, pair[0].y), (pair[1].x, pair[1].y), color);
    }
    if closed && pts.len() > 2 {
        let (first, last) = (pts[0], pts[pts.len() - 1]);
        draw_line_segment_mut(img, (last.x, last.y), (first.x, first.y), color);
    }
}

/// Outline the ROI quadrilateral.
pub fn draw_roi(img: &mut RgbImage, roi: &RoiConfig) {
    draw_polyline(img, &roi.polygon(), true, ROI_COLOR);
}

/// Box outline plus width and height dimension lines below and right of it.
pub fn draw_measurement(img: &mut RgbImage, m: &Measurement) {
    let [[x1, y1], [x2, y2]] = m.display_box;
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));

    let w = (right - left).round().max(1.0) as u32;
    let h = (bottom - top).round().max(1.0) as u32;
    draw_hollow_rect_mut(
        img,
        Rect::at(left.round() as i32, top.round() as i32).of_size(w, h),
        BOX_COLOR,
    );

    let below = bottom + DIMENSION_OFFSET;
    let beside = right + DIMENSION_OFFSET;
    draw_line_segment_mut(img, (left, below), (right, below), DIMENSION_COLOR);
    draw_line_segment_mut(img, (beside, top), (beside, bottom), DIMENSION_COLOR);
}

/// Points picked so far, joined in pick order; closed once all four exist.
pub fn draw_roi_picks(img: &mut RgbImage, picks: &[Point2<f32>]) {
    for p in picks {
        draw_filled_circle_mut(img, (p.x.round() as i32, p.y.round() as i32), 5, PICK_COLOR);
    }
    draw_polyline(img, picks, picks.len() == 4, PICK_COLOR);
}

pub fn draw_reference_line(img: &mut RgbImage, a: Point2<f32>, b: Point2<f32>) {
    draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), PICK_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_outline_touches_corners() {
        let mut img = RgbImage::new(50, 50);
        let roi = RoiConfig::from_picked([
            Point2::new(10.0, 10.0),
            Point2::new(40.0, 10.0),
            Point2::new(40.0, 40.0),
            Point2::new(10.0, 40.0),
        ])
        .unwrap();
        draw_roi(&mut img, &roi);
        assert_eq!(*img.get_pixel(10, 10), ROI_COLOR);
        assert_eq!(*img.get_pixel(25, 40), ROI_COLOR);
        assert_eq!(*img.get_pixel(25, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn picks_draw_markers() {
        let mut img = RgbImage::new(30, 30);
        draw_roi_picks(&mut img, &[Point2::new(15.0, 15.0)]);
        assert_eq!(*img.get_pixel(15, 15), PICK_COLOR);
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}
