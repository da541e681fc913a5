use crate::{CoreError, CoreResult};

/// Floating point type used throughout the simulator
pub type Real = f64;

/// Nominal full-scale raw value of a 16-bit analog channel (S7 convention).
pub const ANALOG_SPAN: i32 = 27648;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> CoreResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Clamp that tolerates an inverted interval (`hi < lo` collapses to `lo`)
/// and maps NaN to `lo`. `f64::clamp` panics on both.
pub fn clamp_lenient(v: Real, lo: Real, hi: Real) -> Real {
    let hi = if hi < lo { lo } else { hi };
    if v.is_nan() {
        return lo;
    }
    v.max(lo).min(hi)
}

/// Linear map of `value` from `from` onto `to`.
///
/// A degenerate source interval maps everything onto `to.0`.
pub fn map_range(value: Real, from: (Real, Real), to: (Real, Real)) -> Real {
    let span = from.1 - from.0;
    if span.abs() <= Real::EPSILON {
        return to.0;
    }
    to.0 + (value - from.0) * (to.1 - to.0) / span
}

/// Raw analog word -> fraction in `[0, 1]`.
pub fn raw_to_fraction(raw: i32, span: i32) -> Real {
    clamp_lenient(map_range(raw as Real, (0.0, span as Real), (0.0, 1.0)), 0.0, 1.0)
}

/// Engineering value on `[0, full_scale]` -> raw analog word on `[0, span]`.
pub fn scale_to_raw(value: Real, full_scale: Real, span: i32) -> u16 {
    let raw = map_range(value, (0.0, full_scale), (0.0, span as Real)).round();
    clamp_lenient(raw, 0.0, span.clamp(0, u16::MAX as i32) as Real) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn clamp_lenient_inverted_interval() {
        assert_eq!(clamp_lenient(50.0, 21.0, 10.0), 21.0);
        assert_eq!(clamp_lenient(Real::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clamp_lenient(0.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn analog_scaling() {
        assert_eq!(raw_to_fraction(13824, ANALOG_SPAN), 0.5);
        assert_eq!(raw_to_fraction(-20, ANALOG_SPAN), 0.0);
        assert_eq!(raw_to_fraction(40000, ANALOG_SPAN), 1.0);
        assert_eq!(scale_to_raw(100.0, 200.0, ANALOG_SPAN), 13824);
        assert_eq!(scale_to_raw(250.0, 200.0, ANALOG_SPAN), 27648);
        assert_eq!(scale_to_raw(5.0, 0.0, ANALOG_SPAN), 0);
    }
}
