use crate::{sample_bilinear_rgb, RgbFrame, RgbFrameView};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Projective 3x3 transform, normalized so that `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.h.try_inverse()?;
        normalize_homography(inv).map(Self::new)
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // Hartley: move the centroid to the origin, scale mean distance to sqrt(2)
    let cx = pts.iter().map(|p| p.x as f64).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y as f64).sum::<f64>() / 4.0;

    let mean_dist = pts
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new(v[0], v[1])
    });
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(h / s)
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    // H = T_dst^-1 * Hn * T_src
    let h = t_dst.try_inverse()? * hn * t_src;
    normalize_homography(h).map(Homography::new)
}

/// Warp into a `out_w x out_h` frame: every destination pixel is mapped to
/// the source through `h_img_from_rect` and sampled bilinearly.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(src, h_img_from_rect), fields(src_w = src.width, src_h = src.height))
)]
pub fn warp_perspective_rgb(
    src: &RgbFrameView<'_>,
    h_img_from_rect: &Homography,
    out_w: usize,
    out_h: usize,
) -> RgbFrame {
    let mut out = RgbFrame::black(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            let pi = h_img_from_rect.apply(Point2::new(x as f32, y as f32));
            if !(pi.x.is_finite() && pi.y.is_finite()) {
                continue;
            }
            let rgb = sample_bilinear_rgb(src, pi.x, pi.y);
            let i = (y * out_w + x) * 3;
            out.data[i..i + 3].copy_from_slice(&rgb);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn conveyor_quad() -> [Point2<f32>; 4] {
        [
            Point2::new(130.0, 70.0),
            Point2::new(420.0, 90.0),
            Point2::new(500.0, 380.0),
            Point2::new(95.0, 410.0),
        ]
    }

    fn rect(w: f32, h: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    #[test]
    fn quad_corners_land_on_rectangle_corners() {
        let quad = conveyor_quad();
        let target = rect(404.0, 339.0);
        let h = homography_from_4pt(&quad, &target).expect("solvable");

        for (q, r) in quad.iter().zip(target.iter()) {
            assert_close(h.apply(*q), *r, 1e-2);
        }
    }

    #[test]
    fn inverse_takes_rectangle_back_to_quad() {
        let quad = conveyor_quad();
        let target = rect(404.0, 339.0);
        let rect_from_img = homography_from_4pt(&quad, &target).expect("solvable");
        let img_from_rect = rect_from_img.inverse().expect("invertible");

        for (r, q) in target.iter().zip(quad.iter()) {
            assert_close(img_from_rect.apply(*r), *q, 1e-2);
        }
        // the rectangle centre maps strictly inside the quad's bounding box
        let c = img_from_rect.apply(Point2::new(202.0, 169.5));
        assert!(c.x > 95.0 && c.x < 500.0 && c.y > 70.0 && c.y < 410.0);
    }

    #[test]
    fn solving_from_rectangle_matches_inverse() {
        let quad = conveyor_quad();
        let target = rect(404.0, 339.0);
        let forward = homography_from_4pt(&quad, &target).expect("solvable");
        let backward = homography_from_4pt(&target, &quad).expect("solvable");
        let inverse = forward.inverse().expect("invertible");

        for p in [Point2::new(10.0_f32, 20.0), Point2::new(250.0, 300.0)] {
            assert_close(backward.apply(p), inverse.apply(p), 1e-2);
        }
    }

    #[test]
    fn coincident_points_have_no_solution() {
        let src = [Point2::new(5.0_f32, 5.0); 4];
        let dst = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(9.0, 0.0),
            Point2::new(9.0, 9.0),
            Point2::new(0.0, 9.0),
        ];
        assert!(homography_from_4pt(&src, &dst).is_none());
    }

    #[test]
    fn identity_warp_copies_frame() {
        let mut src = RgbFrame::black(4, 3);
        for (i, v) in src.data.iter_mut().enumerate() {
            *v = (i * 7 % 251) as u8;
        }
        let out = warp_perspective_rgb(&src.view(), &Homography::identity(), 4, 3);
        assert_eq!(out, src);
    }

    #[test]
    fn warp_outside_source_is_black() {
        let src = RgbFrame {
            width: 2,
            height: 2,
            data: vec![255; 12],
        };
        let shift = Homography::new(Matrix3::new(
            1.0, 0.0, 100.0, //
            0.0, 1.0, 100.0, //
            0.0, 0.0, 1.0,
        ));
        let out = warp_perspective_rgb(&src.view(), &shift, 2, 2);
        assert!(out.data.iter().all(|&v| v == 0));
    }
}
