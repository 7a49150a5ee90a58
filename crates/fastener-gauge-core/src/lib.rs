//! Core types and utilities for gauging fasteners on a conveyor.
//!
//! This crate is purely geometric plus a thin persistence layer. It does
//! *not* depend on any capture device, detector or concrete image crate;
//! frames are plain interleaved RGB buffers.

mod calibration;
mod homography;
mod image;
mod logger;
mod picker;
mod roi;
mod size;
mod store;

pub use calibration::{
    ratio_from_reference, Calibration, CalibrationError, DEFAULT_PIXELS_PER_UNIT,
    DEFAULT_REFERENCE_LENGTH,
};
pub use homography::{homography_from_4pt, warp_perspective_rgb, Homography};
pub use image::{sample_bilinear_rgb, RgbFrame, RgbFrameView};
pub use picker::{
    Key, PickerOutcome, PointerEvent, ReferencePicker, RoiPicker, UiEvent, ROI_POINT_COUNT,
};
pub use roi::{order_points, RoiConfig, RoiError, RoiTransform};
pub use size::{estimate_size, measure_box, DetectionBox, Units};
pub use store::{CalibrationRecord, CalibrationStore, RecordIoError, RoiStore};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
