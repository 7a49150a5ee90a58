//! Frame sources: a live camera (`camera` feature), a directory of stills,
//! or frames held in memory.

use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[cfg(feature = "camera")]
mod camera;
#[cfg(feature = "camera")]
pub use camera::CameraSource;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("capture source {target} is unavailable: {reason}")]
    Unavailable { target: String, reason: String },
}

/// Exclusive handle on a stream of frames.
///
/// `None` from `read_frame` means the stream is over; callers stop reading.
/// The handle is released on drop.
pub trait FrameSource {
    fn read_frame(&mut self) -> Option<RgbImage>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn read_frame(&mut self) -> Option<RgbImage> {
        (**self).read_frame()
    }
}

/// Directory of still images played back in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();
        let unavailable = |reason: String| SourceError::Unavailable {
            target: dir.display().to_string(),
            reason,
        };

        let entries = std::fs::read_dir(&dir).map_err(|err| unavailable(err.to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        if paths.is_empty() {
            return Err(unavailable("no image frames found".to_string()));
        }
        paths.sort();

        log::info!("opened {} with {} frames", dir.display(), paths.len());
        Ok(Self {
            dir,
            paths,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Option<RgbImage> {
        let path = self.paths.get(self.next)?;
        self.next += 1;
        match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(err) => {
                log::error!("could not read frame {}: {err}", path.display());
                None
            }
        }
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        log::debug!(
            "released {} after {} frames",
            self.dir.display(),
            self.next
        );
    }
}

/// In-memory frames, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Option<RgbImage> {
        self.frames.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let err = ImageSequenceSource::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn directory_without_images_is_unavailable() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert!(ImageSequenceSource::open(dir.path()).is_err());
    }

    #[test]
    fn frames_play_in_name_order_then_end() {
        let dir = tempdir().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(4, 4, image::Rgb([shade; 3]))
                .save(dir.path().join(name))
                .unwrap();
        }
        let mut src = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(src.len(), 3);
        let shades: Vec<u8> = std::iter::from_fn(|| src.read_frame())
            .map(|f| f.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30]);
    }

    #[test]
    fn unreadable_frame_ends_stream() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"not a png").unwrap();
        let mut src = ImageSequenceSource::open(dir.path()).unwrap();
        assert!(src.read_frame().is_none());
    }
}
