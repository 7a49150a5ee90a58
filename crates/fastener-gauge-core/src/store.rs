//! On-disk calibration and ROI records.
//!
//! Both stores degrade instead of failing: a missing or unreadable record
//! yields the default, a failed write is logged and the session carries on
//! with the in-memory value.

use crate::{RoiConfig, DEFAULT_PIXELS_PER_UNIT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum RecordIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, RecordIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), RecordIoError> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, json)?;
    Ok(())
}

/// `{ "pixelsPerUnit": <float> }`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub pixels_per_unit: f32,
}

impl CalibrationRecord {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RecordIoError> {
        let rec: Self = load_json(path.as_ref())?;
        if !(rec.pixels_per_unit.is_finite() && rec.pixels_per_unit > 0.0) {
            return Err(RecordIoError::Invalid(format!(
                "pixelsPerUnit must be positive, got {}",
                rec.pixels_per_unit
            )));
        }
        Ok(rec)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RecordIoError> {
        write_json(self, path.as_ref())
    }
}

impl RoiConfig {
    /// Load and re-validate a ROI record.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RecordIoError> {
        let cfg: Self = load_json(path.as_ref())?;
        cfg.validate()
            .map_err(|err| RecordIoError::Invalid(err.to_string()))?;
        Ok(cfg)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RecordIoError> {
        write_json(self, path.as_ref())
    }
}

/// Persisted pixels-per-unit ratio.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub const DEFAULT_PATH: &'static str = "calibration_config.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored ratio, or `DEFAULT_PIXELS_PER_UNIT` if there is none usable.
    pub fn load(&self) -> f32 {
        match CalibrationRecord::load_json(&self.path) {
            Ok(rec) => {
                log::info!(
                    "loaded calibration {:.2} px/unit from {}",
                    rec.pixels_per_unit,
                    self.path.display()
                );
                rec.pixels_per_unit
            }
            Err(RecordIoError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "no calibration at {}, using default {DEFAULT_PIXELS_PER_UNIT} px/unit",
                    self.path.display()
                );
                DEFAULT_PIXELS_PER_UNIT
            }
            Err(err) => {
                log::warn!(
                    "failed to read calibration from {}: {err}; using default {DEFAULT_PIXELS_PER_UNIT} px/unit",
                    self.path.display()
                );
                DEFAULT_PIXELS_PER_UNIT
            }
        }
    }

    /// Overwrite the record. Returns whether the write succeeded.
    pub fn save(&self, pixels_per_unit: f32) -> bool {
        let rec = CalibrationRecord { pixels_per_unit };
        match rec.write_json(&self.path) {
            Ok(()) => {
                log::info!("saved calibration to {}", self.path.display());
                true
            }
            Err(err) => {
                log::error!(
                    "failed to save calibration to {}: {err}",
                    self.path.display()
                );
                false
            }
        }
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

/// Persisted four-point ROI.
#[derive(Clone, Debug)]
pub struct RoiStore {
    path: PathBuf,
}

impl RoiStore {
    pub const DEFAULT_PATH: &'static str = "roi_config.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored ROI, or `None` when absent or invalid.
    pub fn load(&self) -> Option<RoiConfig> {
        match RoiConfig::load_json(&self.path) {
            Ok(cfg) => {
                log::info!(
                    "loaded ROI {}x{} from {}",
                    cfg.width,
                    cfg.height,
                    self.path.display()
                );
                Some(cfg)
            }
            Err(RecordIoError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no ROI at {}, using full frame", self.path.display());
                None
            }
            Err(err) => {
                log::warn!(
                    "failed to read ROI from {}: {err}; using full frame",
                    self.path.display()
                );
                None
            }
        }
    }

    pub fn save(&self, cfg: &RoiConfig) -> bool {
        match cfg.write_json(&self.path) {
            Ok(()) => {
                log::info!("saved ROI to {}", self.path.display());
                true
            }
            Err(err) => {
                log::error!("failed to save ROI to {}: {err}", self.path.display());
                false
            }
        }
    }
}

impl Default for RoiStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}
