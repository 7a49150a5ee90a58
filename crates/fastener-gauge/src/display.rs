//! Display seam: shows frames and hands back key and pointer events.

use crate::core::{Key, UiEvent};
use image::RgbImage;
use std::collections::{HashMap, VecDeque};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub trait DisplaySurface {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Non-blocking; `None` when nothing is pending.
    fn poll_event(&mut self) -> Option<UiEvent>;

    /// Blocks for the next event; `None` once the surface is closed.
    fn wait_event(&mut self) -> Option<UiEvent>;

    fn close_window(&mut self, _window: &str) {}
}

impl<V: DisplaySurface + ?Sized> DisplaySurface for &mut V {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(window, frame)
    }

    fn poll_event(&mut self) -> Option<UiEvent> {
        (**self).poll_event()
    }

    fn wait_event(&mut self) -> Option<UiEvent> {
        (**self).wait_event()
    }

    fn close_window(&mut self, window: &str) {
        (**self).close_window(window)
    }
}

/// Headless display: optionally writes every shown frame as PNG and plays
/// back a scripted event queue.
///
/// `poll_event` only delivers key events at the head of the queue, so a
/// script reads like a session: keys are consumed between frames, pointer
/// events only while a picker is waiting.
#[derive(Debug, Default)]
pub struct ScriptedDisplay {
    output_dir: Option<PathBuf>,
    events: VecDeque<UiEvent>,
    shown: HashMap<String, usize>,
}

impl ScriptedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = UiEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Load a JSON array of events, e.g. `[{"key": {"char": "q"}}]`.
    pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<UiEvent>, DisplayError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Frames shown so far in `window`.
    pub fn shown(&self, window: &str) -> usize {
        self.shown.get(window).copied().unwrap_or(0)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

fn window_slug(window: &str) -> String {
    window
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl DisplaySurface for ScriptedDisplay {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<(), DisplayError> {
        let count = self.shown.entry(window.to_string()).or_insert(0);
        let index = *count;
        *count += 1;

        if let Some(dir) = &self.output_dir {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!("{}-{index:05}.png", window_slug(window)));
            frame.save(&path)?;
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<UiEvent> {
        match self.events.front() {
            Some(UiEvent::Key(_)) => self.events.pop_front(),
            _ => None,
        }
    }

    fn wait_event(&mut self) -> Option<UiEvent> {
        self.events.pop_front()
    }
}

/// True for the quit key.
pub fn is_quit(event: &UiEvent) -> bool {
    matches!(event, UiEvent::Key(Key::Char('q')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointerEvent;
    use tempfile::tempdir;

    #[test]
    fn poll_only_yields_leading_keys() {
        let mut display = ScriptedDisplay::new().with_events([
            UiEvent::Pointer(PointerEvent::Press([1.0, 1.0])),
            UiEvent::Key(Key::Char('q')),
        ]);
        assert_eq!(display.pending_events(), 2);
        assert_eq!(display.poll_event(), None);
        assert!(matches!(display.wait_event(), Some(UiEvent::Pointer(_))));
        assert_eq!(display.poll_event(), Some(UiEvent::Key(Key::Char('q'))));
        assert_eq!(display.wait_event(), None);
        assert_eq!(display.pending_events(), 0);
    }

    #[test]
    fn shown_frames_are_written_per_window() {
        let dir = tempdir().unwrap();
        let mut display = ScriptedDisplay::new().with_output_dir(dir.path());
        let frame = RgbImage::new(3, 3);
        display.show("Object Detection", &frame).unwrap();
        display.show("Object Detection", &frame).unwrap();
        display.show("Rectified ROI", &frame).unwrap();

        assert_eq!(display.shown("Object Detection"), 2);
        assert!(dir.path().join("object_detection-00001.png").exists());
        assert!(dir.path().join("rectified_roi-00000.png").exists());
    }
}
