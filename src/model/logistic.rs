//! Binary logistic regression. Fitting runs through `aprender`; the fitted
//! coefficients are read back into [`LogisticRegression`] so a saved model
//! scores sparse rows without the estimator.

use aprender::classification::LogisticRegression as Estimator;
use aprender::primitives::Matrix;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::record::Label;
use crate::vectorize::CsrMatrix;

/// Keeps `logit` finite when the estimator saturates in `f32`.
const PROBABILITY_FLOOR: f64 = 1e-7;

#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub max_iter: usize,
    pub learning_rate: f64,
}

/// Fitted coefficients: one weight per feature column plus the intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn training_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Training(err.to_string())
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
    (p / (1.0 - p)).ln()
}

/// Dense `f32` copy of `x` in the estimator's layout.
pub fn to_dense(x: &CsrMatrix) -> Result<Matrix<f32>> {
    let mut data = vec![0.0f32; x.rows * x.cols];
    for i in 0..x.rows {
        let (cols, vals) = x.row(i);
        for (&c, &v) in cols.iter().zip(vals) {
            data[i * x.cols + c] = v as f32;
        }
    }
    Matrix::from_vec(x.rows, x.cols, data).map_err(training_error)
}

pub fn estimator(params: FitParams) -> Estimator {
    Estimator::new()
        .with_learning_rate(params.learning_rate as f32)
        .with_max_iter(params.max_iter)
}

/// Fit an estimator on `x`/`y`.
pub fn fit_estimator(x: &CsrMatrix, y: &[Label], params: FitParams) -> Result<Estimator> {
    let targets: Vec<usize> = y.iter().map(|l| usize::from(l.as_u8())).collect();
    let mut model = estimator(params);
    model.fit(&to_dense(x)?, &targets).map_err(training_error)?;
    Ok(model)
}

/// Labels the estimator assigns to each row of `x`.
pub fn estimator_labels(model: &Estimator, x: &CsrMatrix) -> Result<Vec<Label>> {
    Ok(model
        .predict(&to_dense(x)?)
        .into_iter()
        .map(|p| if p == 1 { Label::ClassA } else { Label::ClassB })
        .collect())
}

impl LogisticRegression {
    pub fn zeros(cols: usize) -> Self {
        Self {
            weights: vec![0.0; cols],
            bias: 0.0,
        }
    }

    pub fn fit(x: &CsrMatrix, y: &[Label], params: FitParams) -> Result<Self> {
        let model = fit_estimator(x, y, params)?;
        Self::from_estimator(&model, x.cols)
    }

    /// Recover the intercept from the origin and each weight from the
    /// matching unit vector, scored by the fitted estimator.
    pub fn from_estimator(model: &Estimator, cols: usize) -> Result<Self> {
        let mut basis = CsrMatrix::empty(cols);
        basis.push_row(&[]);
        for c in 0..cols {
            basis.push_row(&[(c, 1.0)]);
        }
        let proba = model.predict_proba(&to_dense(&basis)?);
        let z: Vec<f64> = proba.as_slice().iter().map(|&p| logit(f64::from(p))).collect();
        if z.len() != cols + 1 {
            return Err(training_error(format!(
                "estimator scored {} rows, expected {}",
                z.len(),
                cols + 1
            )));
        }
        let bias = z[0];
        let weights = z[1..].iter().map(|zc| zc - bias).collect();
        Ok(Self { weights, bias })
    }

    pub fn decision(&self, x: &CsrMatrix, row: usize) -> f64 {
        let (cols, vals) = x.row(row);
        cols.iter()
            .zip(vals)
            .fold(self.bias, |acc, (&c, &v)| acc + self.weights[c] * v)
    }

    /// Probability of class A for `row`.
    pub fn probability(&self, x: &CsrMatrix, row: usize) -> f64 {
        sigmoid(self.decision(x, row))
    }

    /// Predicted label and the larger of the two class probabilities.
    pub fn predict_row(&self, x: &CsrMatrix, row: usize) -> (Label, f64) {
        let p = self.probability(x, row);
        if p >= 0.5 {
            (Label::ClassA, p)
        } else {
            (Label::ClassB, 1.0 - p)
        }
    }

    pub fn predict(&self, x: &CsrMatrix) -> Vec<Label> {
        (0..x.rows).map(|i| self.predict_row(x, i).0).collect()
    }
}

pub fn accuracy(predicted: &[Label], expected: &[Label]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    correct as f64 / expected.len() as f64
}
