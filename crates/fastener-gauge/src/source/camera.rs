//! Live capture through OpenCV's `videoio`.

use super::{FrameSource, SourceError};
use image::RgbImage;
use opencv::{core::Mat, imgproc, prelude::*, videoio};

/// Camera opened by device index; the device is released on drop.
pub struct CameraSource {
    index: i32,
    capture: videoio::VideoCapture,
    frames: usize,
}

impl CameraSource {
    pub fn open(index: i32) -> Result<Self, SourceError> {
        let unavailable = |reason: String| SourceError::Unavailable {
            target: format!("camera {index}"),
            reason,
        };
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|err| unavailable(err.to_string()))?;
        if !capture
            .is_opened()
            .map_err(|err| unavailable(err.to_string()))?
        {
            return Err(unavailable("device did not open".to_string()));
        }

        log::info!("opened camera {index}");
        Ok(Self {
            index,
            capture,
            frames: 0,
        })
    }

    pub fn index(&self) -> i32 {
        self.index
    }
}

/// BGR8 capture buffer to an owned RGB image.
fn bgr_to_rgb_image(bgr: &Mat) -> opencv::Result<Option<RgbImage>> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;
    let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
    Ok(RgbImage::from_raw(w, h, rgb.data_bytes()?.to_vec()))
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Option<RgbImage> {
        let mut bgr = Mat::default();
        match self.capture.read(&mut bgr) {
            Ok(true) if !bgr.empty() => {}
            Ok(_) => {
                log::warn!("camera {} returned no frame", self.index);
                return None;
            }
            Err(err) => {
                log::error!("camera {} read failed: {err}", self.index);
                return None;
            }
        }

        match bgr_to_rgb_image(&bgr) {
            Ok(Some(img)) => {
                self.frames += 1;
                Some(img)
            }
            Ok(None) => {
                log::error!("camera {} frame is not packed RGB8", self.index);
                None
            }
            Err(err) => {
                log::error!("camera {} frame conversion failed: {err}", self.index);
                None
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.capture.release() {
            log::warn!("camera {} release failed: {err}", self.index);
        }
        log::debug!(
            "released camera {} after {} frames",
            self.index,
            self.frames
        );
    }
}
