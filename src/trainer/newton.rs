//! Weighted, L2-penalized logistic log-loss with its gradient and Hessian,
//! accumulated over row shards in parallel.

use crate::risk::sigmoid;
use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

/// `log(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Per-row log-loss for label `y` at score `z`: `softplus(z) - y z`.
pub(crate) fn log_loss(z: f64, y: f64) -> f64 {
    softplus(z) - y * z
}

struct Shard<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    s: ArrayView1<'a, f64>,
}

impl Shard<'_> {
    fn loss(&self, theta: &Array1<f64>) -> f64 {
        let z = self.x.dot(theta);
        z.iter()
            .zip(self.y.iter().zip(self.s.iter()))
            .map(|(&z, (&y, &s))| s * log_loss(z, y))
            .sum()
    }

    fn accumulate(&self, theta: &Array1<f64>) -> (f64, Array1<f64>, Array2<f64>) {
        let z = self.x.dot(theta);
        let n = z.len();
        let mut loss = 0.0;
        let mut resid = Array1::<f64>::zeros(n);
        let mut curv = Array1::<f64>::zeros(n);
        for i in 0..n {
            let (zi, yi, si) = (z[i], self.y[i], self.s[i]);
            let p = sigmoid(zi);
            loss += si * log_loss(zi, yi);
            resid[i] = si * (p - yi);
            curv[i] = si * p * (1.0 - p);
        }
        let grad = self.x.t().dot(&resid);
        let weighted = &self.x * &curv.view().insert_axis(Axis(1));
        let hess = weighted.t().dot(&self.x);
        (loss, grad, hess)
    }
}

pub(crate) struct Evaluation {
    pub loss: f64,
    pub grad: Array1<f64>,
    pub hess: Array2<f64>,
}

/// Design matrix carries a trailing column of ones for the bias; the L2
/// penalty skips that column.
pub(crate) struct Objective {
    x: Array2<f64>,
    y: Array1<f64>,
    s: Array1<f64>,
    total_weight: f64,
    l2: f64,
    shard_rows: usize,
}

impl Objective {
    pub fn new(x: Array2<f64>, y: Array1<f64>, s: Array1<f64>, l2: f64, shard_rows: usize) -> Self {
        let total_weight = s.sum();
        Self {
            x,
            y,
            s,
            total_weight,
            l2,
            shard_rows: shard_rows.max(1),
        }
    }

    pub fn params_len(&self) -> usize {
        self.x.ncols()
    }

    fn shards(&self) -> Vec<Shard<'_>> {
        let n = self.x.nrows();
        (0..n)
            .step_by(self.shard_rows)
            .map(|start| {
                let end = (start + self.shard_rows).min(n);
                Shard {
                    x: self.x.slice(s![start..end, ..]),
                    y: self.y.slice(s![start..end]),
                    s: self.s.slice(s![start..end]),
                }
            })
            .collect()
    }

    fn penalty(&self, theta: &Array1<f64>) -> f64 {
        let d = theta.len() - 1;
        0.5 * self.l2 * theta.slice(s![..d]).iter().map(|t| t * t).sum::<f64>()
    }

    pub fn loss(&self, theta: &Array1<f64>) -> f64 {
        // collected in shard order so the sum is reproducible
        let partial: Vec<f64> = self.shards().par_iter().map(|sh| sh.loss(theta)).collect();
        partial.iter().sum::<f64>() / self.total_weight + self.penalty(theta)
    }

    pub fn evaluate(&self, theta: &Array1<f64>) -> Evaluation {
        let k = theta.len();
        let partial: Vec<_> = self
            .shards()
            .par_iter()
            .map(|sh| sh.accumulate(theta))
            .collect();

        let mut loss = 0.0;
        let mut grad = Array1::<f64>::zeros(k);
        let mut hess = Array2::<f64>::zeros((k, k));
        for (l, g, h) in partial {
            loss += l;
            grad += &g;
            hess += &h;
        }
        grad /= self.total_weight;
        hess /= self.total_weight;

        for j in 0..k - 1 {
            grad[j] += self.l2 * theta[j];
            hess[[j, j]] += self.l2;
        }

        Evaluation {
            loss: loss / self.total_weight + self.penalty(theta),
            grad,
            hess,
        }
    }
}

/// Solve `a x = b` for symmetric positive-definite `a` by Cholesky.
/// `None` when `a` is not positive definite or the solution is not finite.
pub(crate) fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let m = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
    let rhs = DVector::from_iterator(n, b.iter().copied());
    let x = m.cholesky()?.solve(&rhs);
    if x.iter().all(|v| v.is_finite()) {
        Some(Array1::from_iter(x.iter().copied()))
    } else {
        None
    }
}
