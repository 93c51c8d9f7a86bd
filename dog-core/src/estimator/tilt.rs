// estimator/tilt.rs
use crate::config::{TILT_FIELD_SCALE, TILT_GAIN_POSITION, TILT_GAIN_VELOCITY, TILT_SATURATION};

/// Constant-velocity predictor/corrector for one axis.
/// Units are raw sensor degrees and degrees per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct AxisFilter {
    position: f32,
    velocity: f32,
}

impl AxisFilter {
    fn update(&mut self, measurement: f32) {
        // Predict
        let predicted = self.position + self.velocity;

        // Correct with fixed gains
        let innovation = measurement - predicted;
        self.position = predicted + TILT_GAIN_POSITION * innovation;
        self.velocity += TILT_GAIN_VELOCITY * innovation;
    }
}

/// Three axis tilt estimate built from a clamped, quantized tilt sensor.
///
/// The gains are fixed and tuned for one update per control tick
/// (`config::TICK_PERIOD`); running the filter at another rate changes its
/// time constant.
pub struct TiltEstimator {
    axes: [AxisFilter; 3],
}

impl TiltEstimator {
    pub const fn new() -> Self {
        Self {
            axes: [AxisFilter {
                position: 0.0,
                velocity: 0.0,
            }; 3],
        }
    }

    /// Feeds one raw reading and returns the corrected position per axis (degrees).
    pub fn update(&mut self, raw: [i16; 3]) -> [f32; 3] {
        let measurement = reconstruct_saturated(raw);
        for (axis, m) in self.axes.iter_mut().zip(measurement) {
            axis.update(m);
        }
        self.estimate()
    }

    pub fn estimate(&self) -> [f32; 3] {
        [self.axes[0].position, self.axes[1].position, self.axes[2].position]
    }

    /// Estimate in telemetry units (tenths of a degree).
    pub fn estimate_fields(&self) -> [i16; 3] {
        self.estimate().map(|p| {
            let scaled = libm::floorf(p * TILT_FIELD_SCALE);
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
    }

    /// Zeroes the state. Only done when the sensor is reacquired.
    pub fn reset(&mut self) {
        self.axes = [AxisFilter::default(); 3];
    }
}

impl Default for TiltEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces every axis pinned at the saturation bound with the magnitude the
/// other two axes leave under the fixed vector length `sqrt(2) * C`:
/// `axis = sign * sqrt(2C^2 - other1^2 - other2^2)`.
pub fn reconstruct_saturated(raw: [i16; 3]) -> [f32; 3] {
    let c = TILT_SATURATION as f32;
    let budget = 2.0 * c * c;
    let mut out = raw.map(|v| v as f32);
    for i in 0..3 {
        let value = raw[i];
        if value.unsigned_abs() < TILT_SATURATION.unsigned_abs() {
            continue;
        }
        let a = raw[(i + 1) % 3] as f32;
        let b = raw[(i + 2) % 3] as f32;
        let magnitude = libm::sqrtf((budget - a * a - b * b).max(0.0));
        out[i] = if value < 0 { -magnitude } else { magnitude };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_unsaturated_reading_passes_through() {
        assert_eq!(reconstruct_saturated([10, -20, 44]), [10.0, -20.0, 44.0]);
    }

    #[test]
    fn test_saturated_axis_is_reconstructed() {
        let c = TILT_SATURATION as f32;
        for (y, z) in [(0i16, 0i16), (10, 20), (-30, 15), (45, 0), (40, -40)] {
            let (fy, fz) = (y as f32, z as f32);
            let expected = libm::sqrtf(2.0 * c * c - fy * fy - fz * fz);
            let out = reconstruct_saturated([45, y, z]);
            assert!(close(out[0], expected), "y={} z={} got {}", y, z, out[0]);
            assert_eq!(out[1], y as f32);
            assert_eq!(out[2], z as f32);

            let negative = reconstruct_saturated([-45, y, z]);
            assert!(close(negative[0], -expected));
        }
    }

    #[test]
    fn test_saturated_middle_axis() {
        let out = reconstruct_saturated([30, -45, 0]);
        assert!(close(out[1], -libm::sqrtf(2.0 * 45.0 * 45.0 - 900.0)));
    }

    #[test]
    fn test_impossible_reading_clamps_to_zero() {
        let out = reconstruct_saturated([45, 45, 45]);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_single_step_applies_fixed_gains() {
        let mut estimator = TiltEstimator::new();
        let out = estimator.update([10, 0, -10]);
        assert!(close(out[0], 1.33));
        assert!(close(out[2], -1.33));
        assert!(close(estimator.axes[0].velocity, 0.0931));
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut estimator = TiltEstimator::new();
        for _ in 0..600 {
            estimator.update([20, -5, 0]);
        }
        let out = estimator.estimate();
        assert!((out[0] - 20.0).abs() < 0.05);
        assert!((out[1] + 5.0).abs() < 0.05);
        assert_eq!(estimator.estimate_fields()[2], 0);
    }

    #[test]
    fn test_reset_zeroes_state() {
        let mut estimator = TiltEstimator::new();
        estimator.update([30, 30, 30]);
        estimator.reset();
        assert_eq!(estimator.estimate(), [0.0; 3]);
        assert_eq!(estimator.estimate_fields(), [0; 3]);
    }
}
