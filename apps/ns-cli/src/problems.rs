//! Built-in benchmark problems for the CLI.

use nalgebra::{DMatrix, DVector};
use ns_core::{
    AeModel, CoreResult, DaeModel, FnAeModel, FnDaeModel, Jacobian, MassMatrix, Params, StateVec,
};

/// Circle-hyperbola intersection: x^2 + y^2 = 4, x y = 1.
pub fn circle() -> CoreResult<(impl AeModel, StateVec)> {
    let model = FnAeModel::new(
        2,
        |y: &DVector<f64>| {
            Ok(DVector::from_vec(vec![
                y[0] * y[0] + y[1] * y[1] - 4.0,
                y[0] * y[1] - 1.0,
            ]))
        },
        |y: &DVector<f64>| {
            Ok(Jacobian::Dense(DMatrix::from_row_slice(
                2,
                2,
                &[2.0 * y[0], 2.0 * y[1], y[1], y[0]],
            )))
        },
    );
    let y0 = StateVec::from_blocks(vec![("x", vec![2.0]), ("y", vec![1.0])])?;
    Ok((model, y0))
}

/// Powell's badly scaled system, a standard least-squares stress test.
pub fn powell() -> CoreResult<(impl AeModel, StateVec)> {
    let model = FnAeModel::new(
        2,
        |y: &DVector<f64>| {
            Ok(DVector::from_vec(vec![
                1e4 * y[0] * y[1] - 1.0,
                (-y[0]).exp() + (-y[1]).exp() - 1.0001,
            ]))
        },
        |y: &DVector<f64>| {
            Ok(Jacobian::Dense(DMatrix::from_row_slice(
                2,
                2,
                &[1e4 * y[1], 1e4 * y[0], -(-y[0]).exp(), -(-y[1]).exp()],
            )))
        },
    );
    let y0 = StateVec::from_blocks(vec![("x", vec![0.0]), ("y", vec![1.0])])?;
    Ok((model, y0))
}

/// Exponential decay `y' = -y`.
pub fn decay() -> CoreResult<(impl DaeModel, StateVec)> {
    let model = FnDaeModel::new(
        1,
        |_t, y: &DVector<f64>| Ok(-y.clone()),
        |_t, _y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, -1.0))),
    );
    let y0 = StateVec::from_blocks(vec![("y", vec![1.0])])?;
    Ok((model, y0))
}

/// Van der Pol oscillator with mu = 1000, the classic stiff benchmark.
pub fn vanderpol() -> CoreResult<(impl DaeModel, StateVec)> {
    let params = Params::new().with_scalar("mu", 1000.0)?;
    let mu = params.scalar("mu")?;
    let model = FnDaeModel::new(
        2,
        move |_t, y: &DVector<f64>| {
            Ok(DVector::from_vec(vec![
                y[1],
                mu * ((1.0 - y[0] * y[0]) * y[1]) - y[0],
            ]))
        },
        move |_t, y: &DVector<f64>| {
            Ok(Jacobian::Dense(DMatrix::from_row_slice(
                2,
                2,
                &[
                    0.0,
                    1.0,
                    -2.0 * mu * y[0] * y[1] - 1.0,
                    mu * (1.0 - y[0] * y[0]),
                ],
            )))
        },
    );
    let y0 = StateVec::from_blocks(vec![("x", vec![2.0]), ("v", vec![0.0])])?;
    Ok((model, y0))
}

/// Robertson chemical kinetics as a semi-explicit DAE: two rate equations
/// plus the mass-conservation constraint.
pub fn robertson() -> CoreResult<(impl DaeModel, StateVec)> {
    fn residual(_t: f64, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        Ok(DVector::from_vec(vec![
            -0.04 * y[0] + 1e4 * y[1] * y[2],
            0.04 * y[0] - 1e4 * y[1] * y[2] - 3e7 * y[1] * y[1],
            y[0] + y[1] + y[2] - 1.0,
        ]))
    }
    fn jacobian(_t: f64, y: &DVector<f64>) -> CoreResult<Jacobian> {
        Ok(Jacobian::Dense(DMatrix::from_row_slice(
            3,
            3,
            &[
                -0.04,
                1e4 * y[2],
                1e4 * y[1],
                0.04,
                -1e4 * y[2] - 6e7 * y[1],
                -1e4 * y[1],
                1.0,
                1.0,
                1.0,
            ],
        )))
    }
    let model = FnDaeModel::new(3, residual, jacobian)
        .with_mass_matrix(MassMatrix::Diagonal(DVector::from_vec(vec![1.0, 1.0, 0.0])));
    let y0 = StateVec::from_blocks(vec![("a", vec![1.0]), ("b", vec![0.0]), ("c", vec![0.0])])?;
    Ok((model, y0))
}

/// Free fall with a terminal ground-contact event.
pub fn ball() -> CoreResult<(impl DaeModel, StateVec)> {
    let params = Params::new().with_scalar("g", 9.8)?;
    let g = params.scalar("g")?;
    let model = FnDaeModel::new(
        2,
        move |_t, y: &DVector<f64>| Ok(DVector::from_vec(vec![y[1], -g])),
        |_t, _y: &DVector<f64>| {
            Ok(Jacobian::Dense(DMatrix::from_row_slice(
                2,
                2,
                &[0.0, 1.0, 0.0, 0.0],
            )))
        },
    );
    let y0 = StateVec::from_blocks(vec![("h", vec![10.0]), ("v", vec![0.0])])?;
    Ok((model, y0))
}
