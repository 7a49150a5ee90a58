//! Four-point region of interest and its perspective rectification.
//!
//! The user picks four image points around the conveyor belt. They are put
//! into a canonical order (top-left, top-right, bottom-right, bottom-left),
//! sized into an axis-aligned rectangle, and a homography maps the
//! quadrilateral onto that rectangle. Detection then runs on the rectified
//! frame, where one calibration ratio holds across the whole belt.

use crate::{homography_from_4pt, warp_perspective_rgb, Homography, RgbFrame, RgbFrameView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Maximum reprojection error (pixels) of the ROI corners through the
/// solved homography.
const CORNER_REPROJECTION_TOL: f64 = 1e-2;

/// Twice the triangle area below which three points count as collinear.
const COLLINEAR_EPS: f32 = 1e-3;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RoiError {
    #[error("degenerate ROI quadrilateral: {0}")]
    Degenerate(&'static str),
    #[error("rectified ROI is empty ({width}x{height})")]
    EmptyRect { width: u32, height: u32 },
    #[error("stored rectified size {width}x{height} does not match the ROI points")]
    SizeMismatch { width: u32, height: u32 },
    #[error("perspective transform is singular")]
    SingularMatrix,
}

/// Canonical order: top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y`, bottom-right the largest. Top-right
/// has the smallest `y - x`, bottom-left the largest. Ties on one key are
/// broken by the other, so the result depends only on the point set and
/// ordering an ordered quad returns it unchanged. Undefined for degenerate
/// input, which `RoiConfig::from_picked` rejects.
pub fn order_points(pts: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    // (x + y, y - x)
    let keys = pts.map(|p| (p.x + p.y, p.y - p.x));

    let tl = extremum(&keys, |k| (k.0, k.1), Ordering::Less);
    let br = extremum(&keys, |k| (k.0, k.1), Ordering::Greater);
    let tr = extremum(&keys, |k| (k.1, k.0), Ordering::Less);
    let bl = extremum(&keys, |k| (k.1, k.0), Ordering::Greater);

    [pts[tl], pts[tr], pts[br], pts[bl]]
}

/// Index of the point whose lexicographic key is furthest toward `toward`.
fn extremum(
    keys: &[(f32, f32); 4],
    key: impl Fn(&(f32, f32)) -> (f32, f32),
    toward: Ordering,
) -> usize {
    (1..keys.len()).fold(0, |best, i| {
        let (a, b) = (key(&keys[i]), key(&keys[best]));
        let ord = a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1));
        if ord == toward {
            i
        } else {
            best
        }
    })
}

fn dist(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (b - a).norm()
}

fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn segments_cross(p1: Point2<f32>, p2: Point2<f32>, q1: Point2<f32>, q2: Point2<f32>) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn check_simple_quad(q: &[Point2<f32>; 4]) -> Result<(), RoiError> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            if q[i] == q[j] {
                return Err(RoiError::Degenerate("coincident points"));
            }
        }
    }
    for skip in 0..4 {
        let tri: Vec<Point2<f32>> = (0..4).filter(|&k| k != skip).map(|k| q[k]).collect();
        if cross(tri[0], tri[1], tri[2]).abs() < COLLINEAR_EPS {
            return Err(RoiError::Degenerate("three collinear points"));
        }
    }
    if segments_cross(q[0], q[1], q[2], q[3]) || segments_cross(q[1], q[2], q[3], q[0]) {
        return Err(RoiError::Degenerate("self-intersecting edges"));
    }
    Ok(())
}

/// Persisted ROI: ordered corner points plus the rectified size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoiConfig {
    /// Top-left, top-right, bottom-right, bottom-left in image pixels.
    pub points: [[f32; 2]; 4],
    pub width: u32,
    pub height: u32,
}

impl RoiConfig {
    /// Build from four raw picks in any order.
    pub fn from_picked(picked: [Point2<f32>; 4]) -> Result<Self, RoiError> {
        let ordered = order_points(picked);
        check_simple_quad(&ordered)?;
        Self::from_ordered(ordered)
    }

    /// Size the rectangle for already-ordered points.
    ///
    /// Width is the longer of the top and bottom edges, height the longer of
    /// the left and right edges, each truncated to whole pixels.
    pub fn from_ordered(points: [Point2<f32>; 4]) -> Result<Self, RoiError> {
        let [tl, tr, br, bl] = points;
        let width = (dist(tl, tr) as u32).max(dist(bl, br) as u32);
        let height = (dist(tl, bl) as u32).max(dist(tr, br) as u32);
        if width == 0 || height == 0 {
            return Err(RoiError::EmptyRect { width, height });
        }
        Ok(Self {
            points: points.map(|p| [p.x, p.y]),
            width,
            height,
        })
    }

    /// Re-check a config that did not come through the constructors,
    /// e.g. one read back from disk.
    pub fn validate(&self) -> Result<(), RoiError> {
        let pts = self.corner_points();
        if order_points(pts) != pts {
            return Err(RoiError::Degenerate("points are not in canonical order"));
        }
        check_simple_quad(&pts)?;
        let expected = Self::from_ordered(pts)?;
        if (expected.width, expected.height) != (self.width, self.height) {
            return Err(RoiError::SizeMismatch {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn corner_points(&self) -> [Point2<f32>; 4] {
        self.points.map(|[x, y]| Point2::new(x, y))
    }

    /// Destination corners of the rectified frame, in the same order.
    pub fn rect_corners(&self) -> [Point2<f32>; 4] {
        let w = self.width.saturating_sub(1) as f32;
        let h = self.height.saturating_sub(1) as f32;
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    /// Closed polygon for drawing, in image pixels.
    pub fn polygon(&self) -> Vec<Point2<f32>> {
        self.corner_points().to_vec()
    }
}

/// Forward and inverse mapping between the ROI and its rectified frame.
///
/// Derived from a `RoiConfig`; never persisted.
#[derive(Clone, Copy, Debug)]
pub struct RoiTransform {
    pub config: RoiConfig,
    pub rect_from_img: Homography,
    pub img_from_rect: Homography,
}

impl RoiTransform {
    pub fn new(config: RoiConfig) -> Result<Self, RoiError> {
        let src = config.corner_points();
        let dst = config.rect_corners();

        let rect_from_img = homography_from_4pt(&src, &dst).ok_or(RoiError::SingularMatrix)?;
        for (s, d) in src.iter().zip(dst.iter()) {
            let q = rect_from_img.apply_f64(Point2::new(s.x as f64, s.y as f64));
            let err = (q.x - d.x as f64).hypot(q.y - d.y as f64);
            if !(err <= CORNER_REPROJECTION_TOL) {
                return Err(RoiError::SingularMatrix);
            }
        }
        let img_from_rect = rect_from_img.inverse().ok_or(RoiError::SingularMatrix)?;

        Ok(Self {
            config,
            rect_from_img,
            img_from_rect,
        })
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Rectify `frame` into a `width x height` frame.
    pub fn warp(&self, frame: &RgbFrameView<'_>) -> RgbFrame {
        warp_perspective_rgb(
            frame,
            &self.img_from_rect,
            self.config.width as usize,
            self.config.height as usize,
        )
    }

    /// Original-frame point to rectified coordinates.
    pub fn warp_point(&self, p: Point2<f32>) -> Point2<f32> {
        self.rect_from_img.apply(p)
    }

    /// Rectified point back to original-frame coordinates. Not clamped.
    pub fn unwarp_point(&self, p: Point2<f32>) -> Point2<f32> {
        self.img_from_rect.apply(p)
    }
}
