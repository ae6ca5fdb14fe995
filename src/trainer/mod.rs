//! Offline training: seeded split, scheme fitting on the training partition,
//! and a damped Newton fit of an L2-penalized logistic regression.
//!
//! One blocking call; either a complete [`ModelParameters`] comes back or an
//! error does. Nothing is written here, so a failed run cannot disturb a
//! model that is already saved or being served.

mod newton;
mod split;

use crate::config::{ClassWeight, TrainingConfig};
use crate::error::{Result, StrokeError};
use crate::features::{encode, EncodingScheme};
use crate::model::ModelParameters;
use crate::record::PatientRecord;
use crate::risk::sigmoid;
use ndarray::{Array1, Array2};
use newton::{log_loss, solve_spd, Objective};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cooperative stop signal, checked once per iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Metrics recorded with the trained parameters. Informational only:
/// a poor accuracy does not fail training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub seed: u64,
    pub train_size: usize,
    pub eval_size: usize,
    /// Share of positive labels across the whole dataset
    pub positive_rate: f64,
    pub train_positive_rate: f64,
    pub class_weight: ClassWeight,
    pub iterations: usize,
    /// Weighted, penalized objective at the solution
    pub train_loss: f64,
    pub eval_accuracy: Option<f64>,
    /// Unweighted mean log-loss on the held-out partition
    pub eval_log_loss: Option<f64>,
}

fn rate(positives: usize, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        positives as f64 / n as f64
    }
}

fn label(y: bool) -> f64 {
    if y {
        1.0
    } else {
        0.0
    }
}

/// Per-class sample weights: `n / (2 * n_class)` when balanced.
fn class_weights(mode: ClassWeight, n: usize, positives: usize) -> (f64, f64) {
    match mode {
        ClassWeight::None => (1.0, 1.0),
        ClassWeight::Balanced => {
            let n = n as f64;
            let neg = n / (2.0 * (n - positives as f64));
            let pos = n / (2.0 * positives as f64);
            (neg, pos)
        }
    }
}

struct Deadline {
    cancel: CancellationToken,
    until: Option<Instant>,
}

impl Deadline {
    fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StrokeError::Cancelled("cancellation requested".into()));
        }
        if self.until.is_some_and(|t| Instant::now() >= t) {
            return Err(StrokeError::Cancelled("training timeout elapsed".into()));
        }
        Ok(())
    }
}

/// Fit a model on labeled records.
pub fn train(
    samples: &[(PatientRecord, bool)],
    config: &TrainingConfig,
    cancel: &CancellationToken,
) -> Result<ModelParameters> {
    config.validate()?;
    let deadline = Deadline {
        cancel: cancel.clone(),
        until: config
            .timeout_secs
            .map(|s| Instant::now() + Duration::from_secs(s)),
    };
    deadline.check()?;

    let n = samples.len();
    if n == 0 {
        return Err(StrokeError::Dataset("no training records".into()));
    }
    let positives = samples.iter().filter(|(_, y)| *y).count();

    let (train_idx, eval_idx) = split::partition(n, config.eval_fraction, config.seed);
    let train_positives = train_idx.iter().filter(|&&i| samples[i].1).count();
    if train_positives == 0 || train_positives == train_idx.len() {
        return Err(StrokeError::Dataset(format!(
            "training partition has a single class ({} of {} positive)",
            train_positives,
            train_idx.len()
        )));
    }

    let scheme = EncodingScheme::fit(train_idx.iter().map(|&i| &samples[i].0))?;
    let d = scheme.dimension();

    let (neg_w, pos_w) = class_weights(config.class_weight, train_idx.len(), train_positives);
    let mut x = Array2::<f64>::zeros((train_idx.len(), d + 1));
    let mut y = Array1::<f64>::zeros(train_idx.len());
    let mut s = Array1::<f64>::zeros(train_idx.len());
    for (row, &i) in train_idx.iter().enumerate() {
        let (record, is_stroke) = &samples[i];
        let v = encode(record, &scheme)
            .map_err(|e| StrokeError::Dataset(format!("record {i}: {e}")))?;
        for (col, value) in v.values.iter().enumerate() {
            x[[row, col]] = *value;
        }
        x[[row, d]] = 1.0;
        y[row] = label(*is_stroke);
        s[row] = if *is_stroke { pos_w } else { neg_w };
    }

    info!(
        records = n,
        train = train_idx.len(),
        eval = eval_idx.len(),
        positive_rate = rate(positives, n),
        class_weight = ?config.class_weight,
        "training started"
    );

    let objective = Objective::new(x, y, s, config.l2, config.shard_rows);
    let (theta, iterations, train_loss) = fit(&objective, config, || deadline.check())?;

    let weights = theta.slice(ndarray::s![..d]).to_vec();
    let bias = theta[d];

    let (eval_accuracy, eval_log_loss) = evaluate(samples, &eval_idx, &scheme, &weights, bias)?;

    let report = TrainingReport {
        seed: config.seed,
        train_size: train_idx.len(),
        eval_size: eval_idx.len(),
        positive_rate: rate(positives, n),
        train_positive_rate: rate(train_positives, train_idx.len()),
        class_weight: config.class_weight,
        iterations,
        train_loss,
        eval_accuracy,
        eval_log_loss,
    };
    info!(
        iterations,
        train_loss,
        eval_accuracy = ?eval_accuracy,
        eval_log_loss = ?eval_log_loss,
        "training finished"
    );

    Ok(ModelParameters::new(weights, bias, scheme)?.with_report(report))
}

/// Smallest step fraction tried before the line search gives up
const MIN_STEP: f64 = 1e-10;

/// Damped Newton iterations until every gradient component is below tolerance.
/// `check` runs before every iteration; its error aborts the fit.
fn fit(
    objective: &Objective,
    config: &TrainingConfig,
    mut check: impl FnMut() -> Result<()>,
) -> Result<(Array1<f64>, usize, f64)> {
    let mut theta = Array1::<f64>::zeros(objective.params_len());
    let mut iterations = 0;

    loop {
        check()?;
        let eval = objective.evaluate(&theta);
        if !eval.loss.is_finite() {
            return Err(StrokeError::Convergence(format!(
                "objective became non-finite after {iterations} iterations"
            )));
        }
        let max_grad = eval.grad.iter().fold(0.0f64, |m, g| m.max(g.abs()));
        debug!(iteration = iterations, loss = eval.loss, max_grad, "newton step");
        if max_grad < config.tolerance {
            return Ok((theta, iterations, eval.loss));
        }
        if iterations >= config.max_iterations {
            return Err(StrokeError::Convergence(format!(
                "gradient {max_grad:.3e} still above tolerance {:.1e} after {iterations} iterations",
                config.tolerance
            )));
        }

        let step = solve_spd(&eval.hess, &eval.grad)
            .ok_or_else(|| StrokeError::Convergence("Hessian is not positive definite".into()))?;
        theta = line_search(objective, &theta, &step, eval.loss)?;
        iterations += 1;
    }
}

/// Halve the step until the objective does not increase.
fn line_search(
    objective: &Objective,
    theta: &Array1<f64>,
    step: &Array1<f64>,
    loss: f64,
) -> Result<Array1<f64>> {
    let mut t = 1.0;
    while t >= MIN_STEP {
        let candidate = theta - &(step * t);
        if objective.loss(&candidate) <= loss {
            return Ok(candidate);
        }
        t *= 0.5;
    }
    Err(StrokeError::Convergence(format!(
        "line search failed: no decrease from loss {loss:.6e} along the Newton direction"
    )))
}

fn evaluate(
    samples: &[(PatientRecord, bool)],
    eval_idx: &[usize],
    scheme: &EncodingScheme,
    weights: &[f64],
    bias: f64,
) -> Result<(Option<f64>, Option<f64>)> {
    if eval_idx.is_empty() {
        return Ok((None, None));
    }
    let mut correct = 0usize;
    let mut loss = 0.0;
    for &i in eval_idx {
        let (record, is_stroke) = &samples[i];
        let v = encode(record, scheme)
            .map_err(|e| StrokeError::Dataset(format!("record {i}: {e}")))?;
        let z = weights.iter().zip(&v.values).map(|(w, x)| w * x).sum::<f64>() + bias;
        if (sigmoid(z) >= 0.5) == *is_stroke {
            correct += 1;
        }
        loss += log_loss(z, label(*is_stroke));
    }
    let m = eval_idx.len() as f64;
    Ok((Some(correct as f64 / m), Some(loss / m)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::encode;
    use crate::record::tests::sample_record;
    use crate::record::{Category, Gender, ResidenceType, SmokingStatus, WorkType};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Noisy synthetic cohort: risk rises with age, glucose, hypertension
    /// and heart disease. Labels are sampled, so the classes overlap.
    pub(crate) fn synthetic_cohort(n: usize, seed: u64) -> Vec<(PatientRecord, bool)> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let age: f64 = rng.gen_range(1.0..90.0);
                let glucose: f64 = rng.gen_range(55.0..270.0);
                let hypertension = rng.gen_bool(0.2);
                let heart_disease = rng.gen_bool(0.1);
                let record = PatientRecord {
                    gender: Gender::ALL[rng.gen_range(0..Gender::ALL.len())],
                    age,
                    hypertension,
                    heart_disease,
                    ever_married: rng.gen_bool(0.6),
                    work_type: WorkType::ALL[rng.gen_range(0..WorkType::ALL.len())],
                    residence_type: ResidenceType::ALL[rng.gen_range(0..2)],
                    avg_glucose_level: glucose,
                    bmi: if rng.gen_bool(0.1) {
                        None
                    } else {
                        Some(rng.gen_range(16.0..48.0))
                    },
                    smoking_status: SmokingStatus::ALL[rng.gen_range(0..SmokingStatus::ALL.len())],
                };
                let z = -3.0
                    + 0.06 * (age - 50.0)
                    + 0.012 * (glucose - 110.0)
                    + 0.8 * label(hypertension)
                    + 0.9 * label(heart_disease);
                let y = rng.gen_bool(sigmoid(z));
                (record, y)
            })
            .collect()
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            shard_rows: 64,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn converges_and_learns_direction_of_risk() {
        let data = synthetic_cohort(800, 1);
        let params = train(&data, &quick_config(), &CancellationToken::new()).unwrap();
        let report = params.report.clone().unwrap();

        assert_eq!(report.train_size, 640);
        assert_eq!(report.eval_size, 160);
        assert!(report.iterations > 0 && report.iterations <= 100);
        assert!(report.eval_accuracy.unwrap() > 0.5);
        assert!(report.eval_log_loss.unwrap().is_finite());
        assert!(report.positive_rate > 0.0 && report.positive_rate < 1.0);

        let names = params.scheme.feature_names();
        let w = |name: &str| params.weights[names.iter().position(|n| n == name).unwrap()];
        assert!(w("age") > 0.0);
        assert!(w("avg_glucose_level") > 0.0);
    }

    #[test]
    fn same_seed_reproduces_parameters() {
        let data = synthetic_cohort(300, 2);
        let a = train(&data, &quick_config(), &CancellationToken::new()).unwrap();
        let b = train(&data, &quick_config(), &CancellationToken::new()).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
        assert_eq!(a.scheme, b.scheme);
        assert_eq!(a.report, b.report);
        assert_ne!(a.model_id, b.model_id);
    }

    #[test]
    fn different_seed_changes_split() {
        let data = synthetic_cohort(300, 2);
        let a = train(&data, &quick_config(), &CancellationToken::new()).unwrap();
        let other = TrainingConfig { seed: 43, ..quick_config() };
        let b = train(&data, &other, &CancellationToken::new()).unwrap();
        assert_ne!(a.scheme, b.scheme);
    }

    #[test]
    fn balanced_weighting_raises_positive_probability() {
        let data = synthetic_cohort(600, 3);
        let plain = train(&data, &quick_config(), &CancellationToken::new()).unwrap();
        let balanced_cfg = TrainingConfig {
            class_weight: ClassWeight::Balanced,
            ..quick_config()
        };
        let balanced = train(&data, &balanced_cfg, &CancellationToken::new()).unwrap();

        let score = |p: &ModelParameters| {
            let v = encode(&sample_record(), &p.scheme).unwrap();
            p.weights.iter().zip(&v.values).map(|(w, x)| w * x).sum::<f64>() + p.bias
        };
        assert!(plain.report.as_ref().unwrap().train_positive_rate < 0.5);
        assert!(score(&balanced) > score(&plain));
    }

    #[test]
    fn iteration_cap_is_a_convergence_error() {
        let data = synthetic_cohort(300, 4);
        let cfg = TrainingConfig { max_iterations: 1, ..quick_config() };
        let err = train(&data, &cfg, &CancellationToken::new()).unwrap_err();
        assert_eq!(err.kind(), "ConvergenceError");
    }

    #[test]
    fn cancelled_token_stops_training() {
        let data = synthetic_cohort(100, 5);
        let token = CancellationToken::new();
        token.cancel();
        let err = train(&data, &quick_config(), &token).unwrap_err();
        assert!(matches!(err, StrokeError::Cancelled(_)));
    }

    fn small_objective() -> Objective {
        let x = ndarray::array![
            [1.0, 0.5, 1.0],
            [-1.0, 2.0, 1.0],
            [0.3, -0.7, 1.0],
            [2.0, 0.1, 1.0],
            [-0.4, -1.2, 1.0]
        ];
        let y = ndarray::array![1.0, 0.0, 0.0, 1.0, 1.0];
        let s = Array1::ones(5);
        Objective::new(x, y, s, 1e-3, 2)
    }

    #[test]
    fn cancellation_between_newton_steps_stops_the_fit() {
        let token = CancellationToken::new();
        let deadline = Deadline { cancel: token.clone(), until: None };
        let mut checks = 0;
        let outcome = fit(&small_objective(), &quick_config(), || {
            checks += 1;
            if checks == 2 {
                token.cancel();
            }
            deadline.check()
        });
        assert!(matches!(outcome, Err(StrokeError::Cancelled(_))));
        assert_eq!(checks, 2);
    }

    #[test]
    fn cancel_from_another_thread_yields_no_parameters() {
        let data = synthetic_cohort(3000, 8);
        let token = CancellationToken::new();
        let cfg = TrainingConfig { shard_rows: 16, ..quick_config() };
        let outcome = std::thread::scope(|s| {
            let worker = s.spawn(|| train(&data, &cfg, &token));
            token.cancel();
            worker.join().unwrap()
        });
        // either the pre-check or an in-loop check sees the flag
        assert!(matches!(outcome, Err(StrokeError::Cancelled(_))));
    }

    #[test]
    fn uphill_direction_fails_the_line_search() {
        let obj = small_objective();
        let theta = Array1::zeros(3);
        let eval = obj.evaluate(&theta);

        let uphill = -&eval.grad;
        let err = line_search(&obj, &theta, &uphill, eval.loss).unwrap_err();
        assert_eq!(err.kind(), "ConvergenceError");
        assert!(err.to_string().contains("line search"));

        let next = line_search(&obj, &theta, &eval.grad, eval.loss).unwrap();
        assert!(obj.loss(&next) <= eval.loss);
    }

    #[test]
    fn fit_converges_on_a_small_problem() {
        let (theta, iterations, loss) = fit(&small_objective(), &quick_config(), || Ok(())).unwrap();
        assert_eq!(theta.len(), 3);
        assert!(iterations > 0);
        assert!(loss.is_finite());
    }

    #[test]
    fn zero_timeout_stops_training() {
        let data = synthetic_cohort(100, 5);
        let cfg = TrainingConfig { timeout_secs: Some(0), ..quick_config() };
        assert!(matches!(
            train(&data, &cfg, &CancellationToken::new()),
            Err(StrokeError::Cancelled(_))
        ));
    }

    #[test]
    fn single_class_and_empty_datasets_rejected() {
        let all_negative: Vec<_> = synthetic_cohort(50, 6)
            .into_iter()
            .map(|(r, _)| (r, false))
            .collect();
        assert_eq!(
            train(&all_negative, &quick_config(), &CancellationToken::new())
                .unwrap_err()
                .kind(),
            "DatasetError"
        );
        assert!(train(&[], &quick_config(), &CancellationToken::new()).is_err());
    }

    #[test]
    fn balanced_weights_equalize_class_mass() {
        let (neg, pos) = class_weights(ClassWeight::Balanced, 100, 10);
        assert!((neg * 90.0 - pos * 10.0).abs() < 1e-9);
        assert_eq!(class_weights(ClassWeight::None, 100, 10), (1.0, 1.0));
    }
}
