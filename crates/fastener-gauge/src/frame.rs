//! Conversions between `image::RgbImage` and the core frame types.

use crate::core::{RgbFrame, RgbFrameView};
use image::{Rgb, RgbImage};

/// Borrow an `image::RgbImage` as a core frame view.
pub fn frame_view(img: &RgbImage) -> RgbFrameView<'_> {
    RgbFrameView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn to_rgb_image(frame: &RgbFrame) -> RgbImage {
    RgbImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        Rgb(frame.pixel(x as usize, y as usize))
    })
}
