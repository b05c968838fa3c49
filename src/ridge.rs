//! Closed-form ridge regression.
//!
//! Solves `w = (XᵀX + λI)⁻¹ Xᵀy` on centred data and recovers an unpenalised
//! intercept. `λ` must be strictly positive: that is what keeps `XᵀX + λI`
//! positive definite when there are fewer rows than columns.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use thiserror::Error;

pub const DEFAULT_LAMBDA: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum RidgeError {
    #[error("regularization strength must be > 0 (value: {0})")]
    InvalidLambda(f64),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("normal matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("solution contains non-finite values")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeModel {
    pub weights: Array1<f64>,
    pub intercept: f64,
    pub lambda: f64,
}

impl RidgeModel {
    pub fn predict(&self, features: ArrayView1<f64>) -> Result<f64, RidgeError> {
        if features.len() != self.weights.len() {
            return Err(RidgeError::DimensionMismatch {
                expected: self.weights.len(),
                got: features.len(),
            });
        }
        Ok(self.intercept + features.dot(&self.weights))
    }

    pub fn predict_all(&self, x: &Array2<f64>) -> Result<Array1<f64>, RidgeError> {
        if x.ncols() != self.weights.len() {
            return Err(RidgeError::DimensionMismatch {
                expected: self.weights.len(),
                got: x.ncols(),
            });
        }
        Ok(x.dot(&self.weights) + self.intercept)
    }

    pub fn weight_norm(&self) -> f64 {
        self.weights.dot(&self.weights).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RidgeRegression {
    lambda: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl RidgeRegression {
    pub fn new(lambda: f64) -> Result<Self, RidgeError> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(RidgeError::InvalidLambda(lambda));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<RidgeModel, RidgeError> {
        if x.nrows() == 0 {
            return Err(RidgeError::EmptyTrainingSet);
        }
        if y.len() != x.nrows() {
            return Err(RidgeError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }

        let x_mean = x.mean_axis(Axis(0)).ok_or(RidgeError::EmptyTrainingSet)?;
        let y_mean = y.mean().ok_or(RidgeError::EmptyTrainingSet)?;
        let x_centred = x - &x_mean;
        let y_centred = y - y_mean;

        // normal equations on centred data
        let mut xtx = x_centred.t().dot(&x_centred);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += self.lambda;
        }
        let xty = x_centred.t().dot(&y_centred);

        let weights = solve_cholesky(&xtx, &xty)?;
        let intercept = y_mean - x_mean.dot(&weights);
        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(RidgeError::NonFinite);
        }

        Ok(RidgeModel {
            weights,
            intercept,
            lambda: self.lambda,
        })
    }
}

/// Solves `a · w = b` for symmetric positive definite `a`.
fn solve_cholesky(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, RidgeError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag.is_nan() || diag <= 0.0 {
                    return Err(RidgeError::NotPositiveDefinite);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ w = z
    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * w[j]).sum();
        w[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(w)
}
