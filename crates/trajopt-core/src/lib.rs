//! # trajopt-core
//!
//! Model side of the trajectory optimizer: everything the solver consumes
//! but does not own.
//!
//! ## Modules
//!
//! - [`math`]: Numerical integrators and small linear algebra helpers
//! - [`dynamics`]: Continuous and discrete dynamics models
//! - [`cost`]: Cost functions and their second-order expansions
//! - [`constraints`]: Stage and terminal constraint definitions
//!
//! All vectors and matrices are runtime-sized (`DVector<f64>` /
//! `DMatrix<f64>`), since state and control dimensions are problem data.

pub mod constraints;
pub mod cost;
pub mod dynamics;
pub mod error;
pub mod math;

use nalgebra::{DMatrix, DVector};

pub use error::ModelError;

/// State or control vector
pub type Vector = DVector<f64>;

/// Dense matrix type
pub type Matrix = DMatrix<f64>;
