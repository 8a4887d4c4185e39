use crate::CoreError;
use nalgebra::DVector;

/// Floating point type used throughout the workspace.
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// True when every entry of `v` is finite.
pub fn all_finite(v: &DVector<Real>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Max-abs (infinity) norm. Returns NaN if any entry is NaN.
pub fn max_abs(v: &DVector<Real>) -> Real {
    let mut m = 0.0_f64;
    for &x in v.iter() {
        if x.is_nan() {
            return f64::NAN;
        }
        m = m.max(x.abs());
    }
    m
}
