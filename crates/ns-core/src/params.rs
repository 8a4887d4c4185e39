//! Read-only parameter bundles.

use crate::error::{CoreError, CoreResult};
use nalgebra::DVector;
use std::collections::HashMap;

/// Named parameter bundle, read-only once built.
///
/// Models capture a `Params` at construction and read from it during
/// residual/Jacobian evaluation; solvers never touch it. Values may be
/// scalars (length-1 vectors) or arrays.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, DVector<f64>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named array, validating finiteness.
    pub fn with_array<S: Into<String>>(mut self, name: S, values: Vec<f64>) -> CoreResult<Self> {
        for &v in &values {
            if !v.is_finite() {
                return Err(CoreError::NonFinite {
                    what: "parameter value",
                    value: v,
                });
            }
        }
        self.values.insert(name.into(), DVector::from_vec(values));
        Ok(self)
    }

    /// Insert a named scalar.
    pub fn with_scalar<S: Into<String>>(self, name: S, value: f64) -> CoreResult<Self> {
        self.with_array(name, vec![value])
    }

    pub fn array(&self, name: &str) -> CoreResult<&DVector<f64>> {
        self.values.get(name).ok_or_else(|| CoreError::UnknownVar {
            name: name.to_string(),
        })
    }

    pub fn scalar(&self, name: &str) -> CoreResult<f64> {
        let v = self.array(name)?;
        if v.len() != 1 {
            return Err(CoreError::Dimension {
                what: "scalar parameter",
                expected: 1,
                got: v.len(),
            });
        }
        Ok(v[0])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip() {
        let p = Params::new().with_scalar("g", 9.8).unwrap();
        assert_eq!(p.scalar("g").unwrap(), 9.8);
    }

    #[test]
    fn rejects_non_finite() {
        let err = Params::new().with_scalar("g", f64::NAN).unwrap_err();
        assert!(matches!(err, CoreError::NonFinite { .. }));
    }

    #[test]
    fn scalar_access_on_array_fails() {
        let p = Params::new().with_array("k", vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            p.scalar("k").unwrap_err(),
            CoreError::Dimension { .. }
        ));
    }
}
