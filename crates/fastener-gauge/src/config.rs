//! JSON configuration for a gauging run.

use crate::core::{CalibrationStore, RoiStore, Units};
use crate::pipeline::LoopConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

fn default_roi_path() -> PathBuf {
    PathBuf::from(RoiStore::DEFAULT_PATH)
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from(CalibrationStore::DEFAULT_PATH)
}

/// Everything `fastener-gauge run` needs. Relative paths resolve against
/// the working directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GaugeConfig {
    /// Camera device index; takes precedence over `frames_dir`.
    #[serde(default)]
    pub device: Option<i32>,
    /// Directory of frames played back as the capture source.
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
    /// Recorded detector output (`DetectionLog` JSON).
    #[serde(default)]
    pub detections_path: Option<PathBuf>,
    /// Scripted key/pointer events.
    #[serde(default)]
    pub events_path: Option<PathBuf>,
    /// Where shown frames are written as PNG.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default = "default_roi_path")]
    pub roi_path: PathBuf,
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,
    /// Session-only ratio; the stored calibration is used when absent.
    #[serde(default)]
    pub pixels_per_unit: Option<f32>,
    #[serde(default)]
    pub detection: LoopConfig,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            device: None,
            frames_dir: None,
            detections_path: None,
            events_path: None,
            output_dir: None,
            report_path: None,
            roi_path: default_roi_path(),
            calibration_path: default_calibration_path(),
            pixels_per_unit: None,
            detection: LoopConfig::default(),
        }
    }
}

impl GaugeConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn frames_dir(&self) -> Result<&Path, ConfigError> {
        self.frames_dir
            .as_deref()
            .ok_or(ConfigError::Missing("frames_dir"))
    }

    pub fn detections_path(&self) -> Result<&Path, ConfigError> {
        self.detections_path
            .as_deref()
            .ok_or(ConfigError::Missing("detections_path"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("gauge_report.json"))
    }

    pub fn units(&self) -> Units {
        self.detection.units
    }

    pub fn calibration_store(&self) -> CalibrationStore {
        CalibrationStore::new(&self.calibration_path)
    }

    pub fn roi_store(&self) -> RoiStore {
        RoiStore::new(&self.roi_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: GaugeConfig =
            serde_json::from_str(r#"{"frames_dir": "frames", "detections_path": "det.json"}"#)
                .unwrap();
        assert_eq!(cfg.roi_path, PathBuf::from("roi_config.json"));
        assert_eq!(cfg.calibration_path, PathBuf::from("calibration_config.json"));
        assert_eq!(cfg.detection, LoopConfig::default());
        assert_eq!(cfg.units(), Units::Centimeters);
        assert_eq!(cfg.report_path(), PathBuf::from("gauge_report.json"));
    }

    #[test]
    fn units_accept_short_names() {
        let cfg: GaugeConfig =
            serde_json::from_str(r#"{"detection": {"units": "mm", "threshold": 0.6}}"#).unwrap();
        assert_eq!(cfg.units(), Units::Millimeters);
        assert_eq!(cfg.detection.threshold, 0.6);
        assert!(matches!(cfg.frames_dir(), Err(ConfigError::Missing("frames_dir"))));
    }

    #[test]
    fn written_config_reloads_with_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gauge.json");

        let mut cfg = GaugeConfig::default();
        cfg.device = Some(1);
        cfg.pixels_per_unit = Some(3.5);
        cfg.detection.units = Units::Millimeters;
        cfg.write_json(&path).unwrap();

        let back = GaugeConfig::load_json(&path).unwrap();
        assert_eq!(back.device, Some(1));
        assert_eq!(back.pixels_per_unit, Some(3.5));
        assert_eq!(back.units(), Units::Millimeters);
        assert_eq!(back.roi_path, PathBuf::from(RoiStore::DEFAULT_PATH));
    }
}
