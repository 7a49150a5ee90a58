//! Event-driven point picking.
//!
//! A display surface feeds `UiEvent`s into a picker; the picker owns the
//! points collected so far and reports when the selection is complete.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

pub const ROI_POINT_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Enter,
    Escape,
    Char(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEvent {
    Press([f32; 2]),
    Drag([f32; 2]),
    Release([f32; 2]),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiEvent {
    Key(Key),
    Pointer(PointerEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PickerOutcome<T> {
    Pending,
    Reset,
    Done(T),
}

fn point([x, y]: [f32; 2]) -> Point2<f32> {
    Point2::new(x, y)
}

/// Collects four ROI corners; Enter confirms, Escape starts over.
#[derive(Clone, Debug, Default)]
pub struct RoiPicker {
    points: Vec<Point2<f32>>,
}

impl RoiPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == ROI_POINT_COUNT
    }

    pub fn handle(&mut self, event: UiEvent) -> PickerOutcome<[Point2<f32>; 4]> {
        match event {
            UiEvent::Pointer(PointerEvent::Press(p)) if !self.is_complete() => {
                self.points.push(point(p));
                PickerOutcome::Pending
            }
            UiEvent::Key(Key::Escape) => {
                self.points.clear();
                PickerOutcome::Reset
            }
            UiEvent::Key(Key::Enter) => match <[Point2<f32>; 4]>::try_from(self.points.as_slice()) {
                Ok(quad) => PickerOutcome::Done(quad),
                Err(_) => PickerOutcome::Pending,
            },
            _ => PickerOutcome::Pending,
        }
    }
}

/// Press-drag-release line across a reference object.
#[derive(Clone, Debug, Default)]
pub struct ReferencePicker {
    start: Option<Point2<f32>>,
    end: Option<Point2<f32>>,
    dragging: bool,
}

impl ReferencePicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current line for preview drawing.
    pub fn segment(&self) -> Option<(Point2<f32>, Point2<f32>)> {
        Some((self.start?, self.end?))
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn handle(&mut self, event: UiEvent) -> PickerOutcome<[Point2<f32>; 2]> {
        match event {
            UiEvent::Pointer(PointerEvent::Press(p)) => {
                self.start = Some(point(p));
                self.end = None;
                self.dragging = true;
                PickerOutcome::Pending
            }
            UiEvent::Pointer(PointerEvent::Drag(p)) if self.dragging => {
                self.end = Some(point(p));
                PickerOutcome::Pending
            }
            UiEvent::Pointer(PointerEvent::Release(p)) if self.dragging => {
                self.dragging = false;
                self.end = Some(point(p));
                match self.start {
                    Some(start) => PickerOutcome::Done([start, point(p)]),
                    None => PickerOutcome::Pending,
                }
            }
            UiEvent::Key(Key::Escape) => {
                *self = Self::default();
                PickerOutcome::Reset
            }
            _ => PickerOutcome::Pending,
        }
    }
}
