use serde::{Deserialize, Serialize};

/// One detector box in corner form, in pixels of the frame it came from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl DetectionBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// The box clipped to a `frame_w x frame_h` frame; may be empty.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Self {
        let (fw, fh) = (frame_w as f32, frame_h as f32);
        Self {
            x1: self.x1.clamp(0.0, fw),
            y1: self.y1.clamp(0.0, fh),
            x2: self.x2.clamp(0.0, fw),
            y2: self.y2.clamp(0.0, fh),
            ..*self
        }
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

/// Display unit for measurements. Calibration ratios are per millimetre.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[serde(alias = "mm")]
    Millimeters,
    #[default]
    #[serde(alias = "cm")]
    Centimeters,
}

impl Units {
    /// Multiplier from millimetres into this unit.
    pub fn scale(self) -> f32 {
        match self {
            Units::Millimeters => 1.0,
            Units::Centimeters => 0.1,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Units::Millimeters => "mm",
            Units::Centimeters => "cm",
        }
    }
}

/// Convert a box extent in pixels to calibration units.
///
/// `pixels_per_unit` must be positive. A box without area measures `(0, 0)`.
pub fn estimate_size(width_px: f32, height_px: f32, pixels_per_unit: f32) -> (f32, f32) {
    if width_px <= 0.0 || height_px <= 0.0 {
        return (0.0, 0.0);
    }
    (width_px / pixels_per_unit, height_px / pixels_per_unit)
}

/// Measure a detector box found in a `frame_w x frame_h` frame.
///
/// A box with nothing left after clipping to the frame measures `(0, 0)`.
/// Otherwise the unclipped extent is used, so a part sticking out of the
/// ROI still reports its full size.
pub fn measure_box(
    bbox: &DetectionBox,
    frame_w: u32,
    frame_h: u32,
    pixels_per_unit: f32,
) -> (f32, f32) {
    if bbox.clamped(frame_w, frame_h).area() <= 0.0 {
        return (0.0, 0.0);
    }
    estimate_size(bbox.width(), bbox.height(), pixels_per_unit)
}
