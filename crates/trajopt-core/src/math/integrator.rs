//! Numerical integration methods
//!
//! Explicit Euler and Runge-Kutta 4th order (RK4) steps for the controlled
//! ODE dx/dt = f(x, u), with the control held constant over the step
//! (zero-order hold).
//!
//! Each scheme also comes with the Jacobian of the discrete step,
//! A = ∂x⁺/∂x and B = ∂x⁺/∂u, obtained by pushing the continuous Jacobians
//! through every stage with the chain rule. This is exact for the discrete
//! map, not a finite-difference approximation.

use nalgebra::{DMatrix, DVector};

/// RK4 step for a controlled vector field
///
/// # Arguments
/// * `x` - Current state
/// * `u` - Control, held constant over the step
/// * `dt` - Time step
/// * `f` - Derivative function f(x, u) -> dx/dt
///
/// # Returns
/// State after one step
pub fn rk4<F>(x: &DVector<f64>, u: &DVector<f64>, dt: f64, f: F) -> DVector<f64>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    let k1 = f(x, u);
    let k2 = f(&(x + &k1 * (dt / 2.0)), u);
    let k3 = f(&(x + &k2 * (dt / 2.0)), u);
    let k4 = f(&(x + &k3 * dt), u);

    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// Jacobians (A, B) of the RK4 step
///
/// `jac` returns the continuous Jacobians (∂f/∂x, ∂f/∂u) at a given point.
pub fn rk4_jacobian<F, J>(
    x: &DVector<f64>,
    u: &DVector<f64>,
    dt: f64,
    f: F,
    jac: J,
) -> (DMatrix<f64>, DMatrix<f64>)
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>, &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>),
{
    let n = x.len();
    let half = dt / 2.0;
    let eye = DMatrix::<f64>::identity(n, n);

    // Stage 1
    let k1 = f(x, u);
    let (a1, b1) = jac(x, u);

    // Stage 2: x2 = x + h/2 k1
    let x2 = x + &k1 * half;
    let k2 = f(&x2, u);
    let (fx2, fu2) = jac(&x2, u);
    let a2 = &fx2 * (&eye + &a1 * half);
    let b2 = &fx2 * &b1 * half + fu2;

    // Stage 3: x3 = x + h/2 k2
    let x3 = x + &k2 * half;
    let k3 = f(&x3, u);
    let (fx3, fu3) = jac(&x3, u);
    let a3 = &fx3 * (&eye + &a2 * half);
    let b3 = &fx3 * &b2 * half + fu3;

    // Stage 4: x4 = x + h k3
    let x4 = x + &k3 * dt;
    let (fx4, fu4) = jac(&x4, u);
    let a4 = &fx4 * (&eye + &a3 * dt);
    let b4 = &fx4 * &b3 * dt + fu4;

    let a = eye + (a1 + a2 * 2.0 + a3 * 2.0 + a4) * (dt / 6.0);
    let b = (b1 + b2 * 2.0 + b3 * 2.0 + b4) * (dt / 6.0);
    (a, b)
}

/// Explicit Euler step
///
/// Less accurate than RK4 but cheaper; exact for dynamics whose
/// derivative is constant over the step.
pub fn euler<F>(x: &DVector<f64>, u: &DVector<f64>, dt: f64, f: F) -> DVector<f64>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    x + f(x, u) * dt
}

/// Jacobians (A, B) of the explicit Euler step: A = I + h·fx, B = h·fu
pub fn euler_jacobian<J>(
    x: &DVector<f64>,
    u: &DVector<f64>,
    dt: f64,
    jac: J,
) -> (DMatrix<f64>, DMatrix<f64>)
where
    J: Fn(&DVector<f64>, &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>),
{
    let n = x.len();
    let (fx, fu) = jac(x, u);
    (DMatrix::identity(n, n) + fx * dt, fu * dt)
}
