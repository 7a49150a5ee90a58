//! JSON report of a detection session.

use crate::core::RoiConfig;
use crate::pipeline::{LoopExit, LoopSummary, Measurement};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ReportIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub index: usize,
    /// Whether detection ran on the rectified ROI.
    pub rectified: bool,
    pub measurements: Vec<Measurement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub exit: LoopExit,
    pub pixels_per_unit: f32,
    #[serde(default)]
    pub roi: Option<RoiConfig>,
    pub frames: Vec<FrameReport>,
}

impl From<LoopSummary> for SessionReport {
    fn from(summary: LoopSummary) -> Self {
        Self {
            exit: summary.exit,
            pixels_per_unit: summary.pixels_per_unit,
            roi: summary.roi,
            frames: summary.frames,
        }
    }
}

impl SessionReport {
    pub fn measurement_count(&self) -> usize {
        self.frames.iter().map(|f| f.measurements.len()).sum()
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
