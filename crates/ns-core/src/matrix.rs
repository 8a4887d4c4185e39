//! Jacobian and mass-matrix value types.

use crate::error::{CoreError, CoreResult};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

/// Jacobian of a residual with respect to the state vector.
///
/// Models may return either representation; the linear-solve adapter in
/// `ns-roots` owns the decision of how each is factored.
#[derive(Debug, Clone)]
pub enum Jacobian {
    Dense(DMatrix<f64>),
    Sparse(CscMatrix<f64>),
}

impl Jacobian {
    pub fn nrows(&self) -> usize {
        match self {
            Jacobian::Dense(m) => m.nrows(),
            Jacobian::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Jacobian::Dense(m) => m.ncols(),
            Jacobian::Sparse(m) => m.ncols(),
        }
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Jacobian::Dense(m) => m.clone(),
            Jacobian::Sparse(m) => {
                let mut out = DMatrix::zeros(m.nrows(), m.ncols());
                for (i, j, &v) in m.triplet_iter() {
                    out[(i, j)] = v;
                }
                out
            }
        }
    }

    /// True when every stored entry is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Jacobian::Dense(m) => m.iter().all(|x| x.is_finite()),
            Jacobian::Sparse(m) => m.values().iter().all(|x| x.is_finite()),
        }
    }

    /// Check square shape against the model dimension.
    pub fn check_dims(&self, dim: usize) -> CoreResult<()> {
        if self.nrows() != dim {
            return Err(CoreError::Dimension {
                what: "Jacobian rows",
                expected: dim,
                got: self.nrows(),
            });
        }
        if self.ncols() != dim {
            return Err(CoreError::Dimension {
                what: "Jacobian cols",
                expected: dim,
                got: self.ncols(),
            });
        }
        Ok(())
    }
}

/// Mass matrix of a DAE `M y' = F(t, y)`.
///
/// The supported class is diagonal (identity for pure ODEs); a zero
/// diagonal entry marks an algebraic equation.
#[derive(Debug, Clone)]
pub enum MassMatrix {
    Identity,
    Diagonal(DVector<f64>),
}

impl MassMatrix {
    pub fn check_dims(&self, dim: usize) -> CoreResult<()> {
        match self {
            MassMatrix::Identity => Ok(()),
            MassMatrix::Diagonal(d) if d.len() == dim => Ok(()),
            MassMatrix::Diagonal(d) => Err(CoreError::Dimension {
                what: "mass matrix diagonal",
                expected: dim,
                got: d.len(),
            }),
        }
    }

    /// Diagonal entry for row `i`.
    pub fn entry(&self, i: usize) -> f64 {
        match self {
            MassMatrix::Identity => 1.0,
            MassMatrix::Diagonal(d) => d[i],
        }
    }

    /// True when row `i` carries no time derivative.
    pub fn is_algebraic_row(&self, i: usize) -> bool {
        self.entry(i) == 0.0
    }

    /// True when any row is algebraic.
    pub fn has_algebraic_rows(&self, dim: usize) -> bool {
        (0..dim).any(|i| self.is_algebraic_row(i))
    }

    /// `M v`.
    pub fn mul_vec(&self, v: &DVector<f64>) -> DVector<f64> {
        match self {
            MassMatrix::Identity => v.clone(),
            MassMatrix::Diagonal(d) => v.component_mul(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn sparse_to_dense_roundtrip() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 2.0);
        coo.push(1, 0, -1.0);
        coo.push(1, 1, 3.0);
        let jac = Jacobian::Sparse(CscMatrix::from(&coo));

        let dense = jac.to_dense();
        assert_eq!(dense[(0, 0)], 2.0);
        assert_eq!(dense[(0, 1)], 0.0);
        assert_eq!(dense[(1, 0)], -1.0);
        assert_eq!(dense[(1, 1)], 3.0);
    }

    #[test]
    fn jacobian_dim_check() {
        let jac = Jacobian::Dense(DMatrix::zeros(2, 3));
        assert!(jac.check_dims(2).is_err());
        let jac = Jacobian::Dense(DMatrix::zeros(2, 2));
        assert!(jac.check_dims(2).is_ok());
    }

    #[test]
    fn mass_matrix_algebraic_rows() {
        let m = MassMatrix::Diagonal(DVector::from_vec(vec![1.0, 0.0]));
        assert!(!m.is_algebraic_row(0));
        assert!(m.is_algebraic_row(1));
        assert!(m.has_algebraic_rows(2));
        assert!(!MassMatrix::Identity.has_algebraic_rows(2));
    }

    #[test]
    fn mass_matrix_mul() {
        let m = MassMatrix::Diagonal(DVector::from_vec(vec![2.0, 0.0]));
        let v = DVector::from_vec(vec![3.0, 5.0]);
        let mv = m.mul_vec(&v);
        assert_eq!(mv[0], 6.0);
        assert_eq!(mv[1], 0.0);
    }
}
