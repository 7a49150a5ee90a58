use nalgebra::Point2;

/// Ratio used when nothing was ever calibrated.
pub const DEFAULT_PIXELS_PER_UNIT: f32 = 10.0;

/// Length of the usual reference object, in millimetres.
pub const DEFAULT_REFERENCE_LENGTH: f32 = 150.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("reference points coincide")]
    DegenerateReference,
    #[error("reference length must be positive and finite (got {0})")]
    InvalidReferenceLength(f32),
}

/// Pixels per unit from a two-point pick spanning a reference of `known_length`.
pub fn ratio_from_reference(
    a: Point2<f32>,
    b: Point2<f32>,
    known_length: f32,
) -> Result<f32, CalibrationError> {
    if !(known_length.is_finite() && known_length > 0.0) {
        return Err(CalibrationError::InvalidReferenceLength(known_length));
    }
    let distance = (b - a).norm();
    if distance <= 0.0 {
        return Err(CalibrationError::DegenerateReference);
    }
    Ok(distance / known_length)
}

/// Active calibration of a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pixels_per_unit: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
        }
    }
}

impl Calibration {
    /// Falls back to the default for non-positive or non-finite ratios.
    pub fn new(pixels_per_unit: f32) -> Self {
        if pixels_per_unit.is_finite() && pixels_per_unit > 0.0 {
            Self { pixels_per_unit }
        } else {
            log::warn!(
                "ignoring invalid calibration ratio {pixels_per_unit}, using {DEFAULT_PIXELS_PER_UNIT}"
            );
            Self::default()
        }
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }

    /// Recalibrate from a reference pick. On error the previous ratio stays.
    pub fn apply_reference(
        &mut self,
        a: Point2<f32>,
        b: Point2<f32>,
        known_length: f32,
    ) -> Result<f32, CalibrationError> {
        match ratio_from_reference(a, b, known_length) {
            Ok(ratio) => {
                log::info!("calibrated: {ratio:.2} px/unit");
                self.pixels_per_unit = ratio;
                Ok(ratio)
            }
            Err(err) => {
                log::warn!(
                    "calibration rejected ({err}), keeping {:.2} px/unit",
                    self.pixels_per_unit
                );
                Err(err)
            }
        }
    }

    /// Session-only override; ignored unless positive.
    pub fn override_ratio(&mut self, pixels_per_unit: f32) -> bool {
        if pixels_per_unit.is_finite() && pixels_per_unit > 0.0 {
            self.pixels_per_unit = pixels_per_unit;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn three_hundred_px_over_150mm() {
        let r = ratio_from_reference(Point2::new(10.0, 20.0), Point2::new(310.0, 20.0), 150.0)
            .unwrap();
        assert_relative_eq!(r, 2.0);
    }

    #[test]
    fn diagonal_reference_uses_euclidean_distance() {
        let r = ratio_from_reference(Point2::new(0.0, 0.0), Point2::new(180.0, 240.0), 150.0)
            .unwrap();
        assert_relative_eq!(r, 2.0);
    }

    #[test]
    fn identical_points_keep_previous_ratio() {
        let mut cal = Calibration::new(3.5);
        let p = Point2::new(42.0, 42.0);
        assert_eq!(
            cal.apply_reference(p, p, 150.0),
            Err(CalibrationError::DegenerateReference)
        );
        assert_relative_eq!(cal.pixels_per_unit(), 3.5);
    }

    #[test]
    fn bad_reference_length_is_rejected() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);
        assert!(ratio_from_reference(a, b, 0.0).is_err());
        assert!(ratio_from_reference(a, b, -1.0).is_err());
        assert!(ratio_from_reference(a, b, f32::NAN).is_err());
    }

    #[test]
    fn invalid_ratio_falls_back_to_default() {
        assert_relative_eq!(Calibration::new(0.0).pixels_per_unit(), DEFAULT_PIXELS_PER_UNIT);
        let mut cal = Calibration::default();
        assert!(!cal.override_ratio(-2.0));
        assert!(cal.override_ratio(4.0));
        assert_relative_eq!(cal.pixels_per_unit(), 4.0);
    }
}
