//! Detector seam. The model itself is out of scope; anything that turns a
//! frame into boxes plugs in here.

use crate::core::DetectionBox;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("inference failed: {0}")]
    Inference(String),
}

pub trait Detector {
    /// Boxes in pixel coordinates of `frame`.
    fn infer(&mut self, frame: &RgbImage) -> Result<Vec<DetectionBox>, DetectorError>;

    fn class_name(&self, class_id: u32) -> Option<&str>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn infer(&mut self, frame: &RgbImage) -> Result<Vec<DetectionBox>, DetectorError> {
        (**self).infer(frame)
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        (**self).class_name(class_id)
    }
}

/// Recorded detector output, one box list per frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionLog {
    pub classes: Vec<String>,
    pub frames: Vec<Vec<DetectionBox>>,
}

/// Replays a `DetectionLog` frame by frame; frames past the end get no boxes.
#[derive(Clone, Debug)]
pub struct ReplayDetector {
    log: DetectionLog,
    next: usize,
}

impl ReplayDetector {
    pub fn new(log: DetectionLog) -> Self {
        Self { log, next: 0 }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let raw = fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&raw)?))
    }
}

impl Detector for ReplayDetector {
    fn infer(&mut self, _frame: &RgbImage) -> Result<Vec<DetectionBox>, DetectorError> {
        let boxes = self.log.frames.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
        Ok(boxes)
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.log.classes.get(class_id as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_then_runs_dry() {
        let log: DetectionLog = serde_json::from_str(
            r#"{
                "classes": ["bolt", "nut"],
                "frames": [
                    [{"x1": 1, "y1": 2, "x2": 3, "y2": 4, "confidence": 0.9, "class_id": 1}],
                    []
                ]
            }"#,
        )
        .unwrap();
        let mut det = ReplayDetector::new(log);
        let frame = RgbImage::new(8, 8);

        let first = det.infer(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(det.class_name(first[0].class_id), Some("nut"));
        assert!(det.infer(&frame).unwrap().is_empty());
        assert!(det.infer(&frame).unwrap().is_empty());
        assert_eq!(det.class_name(7), None);
    }
}
