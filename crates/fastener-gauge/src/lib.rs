//! Conveyor fastener gauging.
//!
//! This crate wires the geometry of `fastener-gauge-core` into a
//! frame-at-a-time detection loop:
//!
//! 1. a [`source::FrameSource`] yields frames,
//! 2. an optional ROI rectifies each frame,
//! 3. a [`detector::Detector`] reports boxes,
//! 4. boxes are measured with the calibration ratio and drawn back onto
//!    the original frame,
//! 5. a [`display::DisplaySurface`] shows the result and feeds key and
//!    pointer events back in.
//!
//! The capture device, the detector and the display are traits; the crate
//! ships file-backed implementations so the whole loop runs headless.
//!
//! ## Quickstart
//!
//! ```no_run
//! use fastener_gauge::{detector::ReplayDetector, display::ScriptedDisplay};
//! use fastener_gauge::pipeline::{DetectionLoop, LoopConfig};
//! use fastener_gauge::source::ImageSequenceSource;
//! use fastener_gauge::core::{CalibrationStore, RoiStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = ImageSequenceSource::open("frames")?;
//! let detector = ReplayDetector::load_json("detections.json")?;
//! let mut display = ScriptedDisplay::new();
//! let mut gauge = DetectionLoop::new(
//!     detector,
//!     LoopConfig::default(),
//!     CalibrationStore::default(),
//!     RoiStore::default(),
//! );
//! let summary = gauge.run(&mut source, &mut display);
//! println!("{} frames, exit {:?}", summary.frames.len(), summary.exit);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `fastener_gauge::core`: ROI, homography, sizing, calibration, records.
//! - `fastener_gauge::pipeline`: the detection loop.
//! - `fastener_gauge::overlay`: drawing helpers.
//! - `fastener_gauge::config` / `report`: JSON inputs and outputs.

pub use fastener_gauge_core as core;

pub use fastener_gauge_core::{DetectionBox, RoiConfig, Units};

pub mod config;
pub mod detector;
pub mod display;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod report;
pub mod source;
