//! Frame-at-a-time detection loop.
//!
//! Per frame: optional ROI rectification, detector call, confidence filter,
//! physical sizing, and overlay rendering in original-frame coordinates.
//! Nothing here propagates an error to the caller: persistence and geometry
//! failures are logged and the loop keeps its previous state.

use crate::core::{
    measure_box, Calibration, CalibrationStore, DetectionBox, Key, PickerOutcome,
    ReferencePicker, RoiConfig, RoiError, RoiPicker, RoiStore, RoiTransform, UiEvent, Units,
    DEFAULT_REFERENCE_LENGTH,
};
use crate::detector::Detector;
use crate::display::{is_quit, DisplaySurface};
use crate::frame::{frame_view, to_rgb_image};
use crate::overlay;
use crate::report::FrameReport;
use crate::source::FrameSource;
use image::RgbImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const DETECTION_WINDOW: &str = "Object Detection with Size";
pub const RECTIFIED_WINDOW: &str = "Perspective Corrected ROI";
pub const ROI_WINDOW: &str = "Select Conveyor Belt Region";
pub const CALIBRATION_WINDOW: &str = "Calibration";

fn default_threshold() -> f32 {
    0.45
}

fn default_reference_length() -> f32 {
    DEFAULT_REFERENCE_LENGTH
}

/// Tunables of the detection loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Boxes at or below this confidence are dropped.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub units: Units,
    /// Physical length of the calibration reference, in millimetres.
    #[serde(default = "default_reference_length")]
    pub reference_length: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            units: Units::default(),
            reference_length: default_reference_length(),
        }
    }
}

/// One measured detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub class_name: String,
    pub class_id: u32,
    pub confidence: f32,
    /// Size in `unit`.
    pub width: f32,
    pub height: f32,
    pub unit: Units,
    /// Box as reported, in the frame the detector saw.
    pub detection_box: DetectionBox,
    /// Top-left and bottom-right corners in original-frame pixels.
    pub display_box: [[f32; 2]; 2],
}

impl Measurement {
    /// e.g. `BOLT: 5.0x2.5cm`
    pub fn label(&self) -> String {
        format!(
            "{}: {:.1}x{:.1}{}",
            self.class_name.to_uppercase(),
            self.width,
            self.height,
            self.unit.suffix()
        )
    }
}

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameOutput {
    /// Original frame with ROI outline and measurements drawn on it.
    pub overlay: RgbImage,
    /// Rectified ROI; `None` when no ROI is configured.
    pub rectified: Option<RgbImage>,
    pub measurements: Vec<Measurement>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// The user pressed `q`.
    Quit,
    /// The source ran out of frames or failed to read one.
    EndOfStream,
}

#[derive(Clone, Debug)]
pub struct LoopSummary {
    pub exit: LoopExit,
    pub frames: Vec<FrameReport>,
    pub pixels_per_unit: f32,
    pub roi: Option<RoiConfig>,
}

pub struct DetectionLoop<D: Detector> {
    detector: D,
    config: LoopConfig,
    calibration: Calibration,
    roi: Option<RoiTransform>,
    calibration_store: CalibrationStore,
    roi_store: RoiStore,
}

impl<D: Detector> DetectionLoop<D> {
    /// Build the loop and restore calibration and ROI from their stores.
    pub fn new(
        detector: D,
        config: LoopConfig,
        calibration_store: CalibrationStore,
        roi_store: RoiStore,
    ) -> Self {
        let calibration = Calibration::new(calibration_store.load());
        let roi = roi_store.load().and_then(|cfg| match RoiTransform::new(cfg) {
            Ok(t) => Some(t),
            Err(err) => {
                log::warn!("stored ROI unusable ({err}); using full frame");
                None
            }
        });
        Self {
            detector,
            config,
            calibration,
            roi,
            calibration_store,
            roi_store,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.calibration.pixels_per_unit()
    }

    pub fn roi(&self) -> Option<&RoiConfig> {
        self.roi.as_ref().map(|t| &t.config)
    }

    /// Use `ratio` for this session without touching the store.
    pub fn override_ratio(&mut self, ratio: f32) {
        if !self.calibration.override_ratio(ratio) {
            log::warn!("ignoring non-positive ratio override {ratio}");
        }
    }

    /// Replace the ROI wholesale (`None` clears it). Not persisted.
    pub fn set_roi(&mut self, roi: Option<RoiConfig>) -> Result<(), RoiError> {
        self.roi = roi.map(RoiTransform::new).transpose()?;
        Ok(())
    }

    /// Rectify, detect, measure and draw one frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(w = frame.width(), h = frame.height()))
    )]
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameOutput {
        let mut overlay = frame.clone();
        let rectified = self.roi.as_ref().map(|t| {
            overlay::draw_roi(&mut overlay, &t.config);
            to_rgb_image(&t.warp(&frame_view(frame)))
        });

        let detection_frame = rectified.as_ref().unwrap_or(frame);
        let boxes = match self.detector.infer(detection_frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                log::warn!("detector failed: {err}");
                Vec::new()
            }
        };

        let ratio = self.calibration.pixels_per_unit();
        let units = self.config.units;
        let (fw, fh) = detection_frame.dimensions();

        let measurements: Vec<Measurement> = boxes
            .into_iter()
            .filter(|b| b.confidence > self.config.threshold)
            .map(|b| {
                let (w_mm, h_mm) = measure_box(&b, fw, fh, ratio);
                let corners = [Point2::new(b.x1, b.y1), Point2::new(b.x2, b.y2)];
                let display = match &self.roi {
                    Some(t) => corners.map(|p| t.unwarp_point(p)),
                    None => corners,
                };
                Measurement {
                    class_name: self
                        .detector
                        .class_name(b.class_id)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("class {}", b.class_id)),
                    class_id: b.class_id,
                    confidence: b.confidence,
                    width: w_mm * units.scale(),
                    height: h_mm * units.scale(),
                    unit: units,
                    detection_box: b,
                    display_box: display.map(|p| [p.x, p.y]),
                }
            })
            .collect();

        for m in &measurements {
            log::debug!("{} (conf {:.2})", m.label(), m.confidence);
            overlay::draw_measurement(&mut overlay, m);
        }

        FrameOutput {
            overlay,
            rectified,
            measurements,
        }
    }

    /// Run until the user quits or the source ends.
    ///
    /// Keys between frames: `q` quits, `c` recalibrates, `r` reselects the ROI.
    pub fn run<S, V>(&mut self, source: &mut S, display: &mut V) -> LoopSummary
    where
        S: FrameSource + ?Sized,
        V: DisplaySurface + ?Sized,
    {
        log::info!(
            "detection loop started: {:.2} px/unit, ROI {}",
            self.pixels_per_unit(),
            if self.roi.is_some() { "on" } else { "off" }
        );

        let mut frames = Vec::new();
        let exit = loop {
            let Some(frame) = source.read_frame() else {
                log::info!("no more frames");
                break LoopExit::EndOfStream;
            };

            let out = self.process_frame(&frame);
            show(display, DETECTION_WINDOW, &out.overlay);
            if let Some(rect) = &out.rectified {
                show(display, RECTIFIED_WINDOW, rect);
            }
            frames.push(FrameReport {
                index: frames.len(),
                rectified: out.rectified.is_some(),
                measurements: out.measurements,
            });

            match display.poll_event() {
                Some(ev) if is_quit(&ev) => break LoopExit::Quit,
                Some(UiEvent::Key(Key::Char('c'))) => {
                    self.calibrate(source, display);
                }
                Some(UiEvent::Key(Key::Char('r'))) => {
                    self.select_roi(source, display);
                }
                _ => {}
            }
        };

        display.close_window(DETECTION_WINDOW);
        display.close_window(RECTIFIED_WINDOW);
        log::info!("detection loop stopped after {} frames: {exit:?}", frames.len());

        LoopSummary {
            exit,
            frames,
            pixels_per_unit: self.pixels_per_unit(),
            roi: self.roi().copied(),
        }
    }

    /// Interactive ROI selection on the next frame.
    ///
    /// Click four corners, Enter confirms, Escape starts over. A degenerate
    /// quadrilateral is rejected and the user picks again. Returns the new
    /// ROI, or `None` if the selection was abandoned (previous ROI kept).
    pub fn select_roi<S, V>(&mut self, source: &mut S, display: &mut V) -> Option<RoiConfig>
    where
        S: FrameSource + ?Sized,
        V: DisplaySurface + ?Sized,
    {
        let Some(frame) = source.read_frame() else {
            log::error!("could not read a frame for ROI selection");
            return None;
        };
        log::info!("ROI selection: click 4 points around the conveyor, Enter to confirm");

        let mut picker = RoiPicker::new();
        show(display, ROI_WINDOW, &frame);
        let selected = loop {
            let Some(event) = display.wait_event() else {
                log::warn!("ROI selection abandoned");
                break None;
            };
            match picker.handle(event) {
                PickerOutcome::Done(quad) => match RoiConfig::from_picked(quad)
                    .and_then(|cfg| RoiTransform::new(cfg).map(|t| (cfg, t)))
                {
                    Ok((cfg, t)) => {
                        self.roi = Some(t);
                        self.roi_store.save(&cfg);
                        log::info!("ROI set: {}x{} px", cfg.width, cfg.height);
                        break Some(cfg);
                    }
                    Err(err) => {
                        log::warn!("ROI rejected ({err}); pick again");
                        picker = RoiPicker::new();
                    }
                },
                PickerOutcome::Reset => log::info!("ROI selection reset"),
                PickerOutcome::Pending => {}
            }
            let mut preview = frame.clone();
            overlay::draw_roi_picks(&mut preview, picker.points());
            show(display, ROI_WINDOW, &preview);
        };
        display.close_window(ROI_WINDOW);
        selected
    }

    /// Interactive calibration against a reference of `reference_length`.
    ///
    /// Picks happen in the frame measurements are taken in: the rectified
    /// ROI when one is set, the raw frame otherwise. A zero-length line is
    /// rejected and the user picks again; `q` or a closed surface abandons
    /// and keeps the previous ratio.
    pub fn calibrate<S, V>(&mut self, source: &mut S, display: &mut V) -> Option<f32>
    where
        S: FrameSource + ?Sized,
        V: DisplaySurface + ?Sized,
    {
        let Some(raw) = source.read_frame() else {
            log::error!("could not read a frame for calibration");
            return None;
        };
        let frame = match &self.roi {
            Some(t) => to_rgb_image(&t.warp(&frame_view(&raw))),
            None => raw,
        };
        log::info!(
            "calibration: drag across the {} mm reference",
            self.config.reference_length
        );

        let mut picker = ReferencePicker::new();
        show(display, CALIBRATION_WINDOW, &frame);
        let result = loop {
            let Some(event) = display.wait_event() else {
                log::warn!("calibration abandoned");
                break None;
            };
            if is_quit(&event) {
                log::info!(
                    "calibration skipped, keeping {:.2} px/unit",
                    self.pixels_per_unit()
                );
                break None;
            }
            if let PickerOutcome::Done([a, b]) = picker.handle(event) {
                match self
                    .calibration
                    .apply_reference(a, b, self.config.reference_length)
                {
                    Ok(ratio) => {
                        self.calibration_store.save(ratio);
                        break Some(ratio);
                    }
                    Err(_) => picker = ReferencePicker::new(),
                }
            }
            let mut preview = frame.clone();
            if let Some((a, b)) = picker.segment() {
                overlay::draw_reference_line(&mut preview, a, b);
            }
            show(display, CALIBRATION_WINDOW, &preview);
        };
        display.close_window(CALIBRATION_WINDOW);
        result
    }
}

fn show<V: DisplaySurface + ?Sized>(display: &mut V, window: &str, frame: &RgbImage) {
    if let Err(err) = display.show(window, frame) {
        log::warn!("could not show {window}: {err}");
    }
}
