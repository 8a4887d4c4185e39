//! Capability traits for generated numerical models.
//!
//! The modeling front end (symbolic differentiation, code generation) is an
//! external collaborator; this crate only requires callables with the
//! numeric signatures below. Any mechanism that produces a valid Jacobian
//! satisfies the contract, whether hand-derived, generated, or differenced.
//! The `Fn*Model` adapters wrap plain closures; [`FdAeModel`] derives the
//! Jacobian by finite differences for models that supply only a residual.

use crate::error::CoreResult;
use crate::fd::{fd_jacobian, FdScheme};
use crate::matrix::{Jacobian, MassMatrix};
use nalgebra::DVector;

/// Algebraic system `0 = F(y, p)`.
///
/// Parameters are captured by the model at construction and are read-only
/// for the duration of every solve.
pub trait AeModel {
    /// Dimension of the state and residual vectors.
    fn dim(&self) -> usize;

    /// Residual `F(y)`.
    fn residual(&self, y: &DVector<f64>) -> CoreResult<DVector<f64>>;

    /// Jacobian `dF/dy`.
    fn jacobian(&self, y: &DVector<f64>) -> CoreResult<Jacobian>;
}

/// Finite-difference-algebraic system `0 = F(y, p, y_prev)`.
pub trait FdaeModel {
    fn dim(&self) -> usize;

    fn residual(&self, y: &DVector<f64>, y_prev: &DVector<f64>) -> CoreResult<DVector<f64>>;

    /// Jacobian with respect to `y` (`y_prev` held fixed).
    fn jacobian(&self, y: &DVector<f64>, y_prev: &DVector<f64>) -> CoreResult<Jacobian>;
}

/// Differential-algebraic system `M y' = F(t, y, p)`.
pub trait DaeModel {
    fn dim(&self) -> usize;

    fn residual(&self, t: f64, y: &DVector<f64>) -> CoreResult<DVector<f64>>;

    fn jacobian(&self, t: f64, y: &DVector<f64>) -> CoreResult<Jacobian>;

    /// Mass matrix; identity for a pure ODE.
    fn mass_matrix(&self) -> MassMatrix {
        MassMatrix::Identity
    }
}

/// Closure-backed [`AeModel`].
pub struct FnAeModel<F, J> {
    dim: usize,
    f: F,
    j: J,
}

impl<F, J> FnAeModel<F, J>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> CoreResult<Jacobian>,
{
    pub fn new(dim: usize, f: F, j: J) -> Self {
        Self { dim, f, j }
    }
}

impl<F, J> AeModel for FnAeModel<F, J>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> CoreResult<Jacobian>,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn residual(&self, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        (self.f)(y)
    }

    fn jacobian(&self, y: &DVector<f64>) -> CoreResult<Jacobian> {
        (self.j)(y)
    }
}

/// Residual-only [`AeModel`] with a finite-difference Jacobian.
///
/// Defaults to forward differencing; [`with_scheme`](Self::with_scheme)
/// switches to central differencing when the extra residual evaluations
/// are worth the accuracy.
pub struct FdAeModel<F> {
    dim: usize,
    f: F,
    epsilon: f64,
    scheme: FdScheme,
}

impl<F> FdAeModel<F>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
{
    pub fn new(dim: usize, f: F) -> Self {
        Self {
            dim,
            f,
            epsilon: 1e-7,
            scheme: FdScheme::Forward,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_scheme(mut self, scheme: FdScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

impl<F> AeModel for FdAeModel<F>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn residual(&self, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        (self.f)(y)
    }

    fn jacobian(&self, y: &DVector<f64>) -> CoreResult<Jacobian> {
        fd_jacobian(y, &self.f, self.epsilon, self.scheme)
    }
}

/// Closure-backed [`FdaeModel`].
pub struct FnFdaeModel<F, J> {
    dim: usize,
    f: F,
    j: J,
}

impl<F, J> FnFdaeModel<F, J>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(&DVector<f64>, &DVector<f64>) -> CoreResult<Jacobian>,
{
    pub fn new(dim: usize, f: F, j: J) -> Self {
        Self { dim, f, j }
    }
}

impl<F, J> FdaeModel for FnFdaeModel<F, J>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(&DVector<f64>, &DVector<f64>) -> CoreResult<Jacobian>,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn residual(&self, y: &DVector<f64>, y_prev: &DVector<f64>) -> CoreResult<DVector<f64>> {
        (self.f)(y, y_prev)
    }

    fn jacobian(&self, y: &DVector<f64>, y_prev: &DVector<f64>) -> CoreResult<Jacobian> {
        (self.j)(y, y_prev)
    }
}

/// Closure-backed [`DaeModel`].
pub struct FnDaeModel<F, J> {
    dim: usize,
    f: F,
    j: J,
    mass: MassMatrix,
}

impl<F, J> FnDaeModel<F, J>
where
    F: Fn(f64, &DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(f64, &DVector<f64>) -> CoreResult<Jacobian>,
{
    pub fn new(dim: usize, f: F, j: J) -> Self {
        Self {
            dim,
            f,
            j,
            mass: MassMatrix::Identity,
        }
    }

    pub fn with_mass_matrix(mut self, mass: MassMatrix) -> Self {
        self.mass = mass;
        self
    }
}

impl<F, J> DaeModel for FnDaeModel<F, J>
where
    F: Fn(f64, &DVector<f64>) -> CoreResult<DVector<f64>>,
    J: Fn(f64, &DVector<f64>) -> CoreResult<Jacobian>,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn residual(&self, t: f64, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        (self.f)(t, y)
    }

    fn jacobian(&self, t: f64, y: &DVector<f64>) -> CoreResult<Jacobian> {
        (self.j)(t, y)
    }

    fn mass_matrix(&self) -> MassMatrix {
        self.mass.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn fn_ae_model_evaluates() {
        let model = FnAeModel::new(
            1,
            |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0] - 4.0)),
            |y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 2.0 * y[0]))),
        );
        let y = DVector::from_element(1, 3.0);
        assert_eq!(model.residual(&y).unwrap()[0], 5.0);
        assert_eq!(model.jacobian(&y).unwrap().to_dense()[(0, 0)], 6.0);
    }

    #[test]
    fn fd_ae_model_jacobian_matches_analytic() {
        let model = FdAeModel::new(1, |y: &DVector<f64>| {
            Ok(DVector::from_element(1, y[0] * y[0]))
        });
        let y = DVector::from_element(1, 3.0);
        let jac = model.jacobian(&y).unwrap().to_dense();
        assert!((jac[(0, 0)] - 6.0).abs() < 1e-5);
    }

    #[test]
    fn fd_ae_model_central_scheme_sharpens_a_coarse_epsilon() {
        let f = |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0] * y[0]));
        let y = DVector::from_element(1, 2.0);

        let forward = FdAeModel::new(1, f).with_epsilon(1e-4);
        let central = FdAeModel::new(1, f)
            .with_epsilon(1e-4)
            .with_scheme(FdScheme::Central);

        let e_forward = (forward.jacobian(&y).unwrap().to_dense()[(0, 0)] - 12.0).abs();
        let e_central = (central.jacobian(&y).unwrap().to_dense()[(0, 0)] - 12.0).abs();
        assert!(e_central < e_forward / 100.0, "{e_central} vs {e_forward}");
    }

    #[test]
    fn dae_model_defaults_to_identity_mass() {
        let model = FnDaeModel::new(
            1,
            |_t, y: &DVector<f64>| Ok(-y.clone()),
            |_t, _y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, -1.0))),
        );
        assert!(matches!(model.mass_matrix(), MassMatrix::Identity));
    }
}
