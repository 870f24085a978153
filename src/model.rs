//! Adjustment model: logistic regression over resolved pick outcomes.
//!
//! Retrained before each evening scan once enough outcomes exist. Inference
//! produces a signed confidence in [-1, 1] that the scoring engine converts
//! into a small point adjustment, so a cold-start model simply contributes
//! nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::features::FeatureRecord;

/// Features the model trains on, in matrix column order. The persisted
/// weights file records this list so stored models survive reordering here.
pub const FEATURE_KEYS: [&str; 15] = [
    "gap_pct",
    "rvol",
    "atr_pct",
    "tech_score",
    "adx",
    "weekly_trend",
    "float_score",
    "rs_score",
    "pm_change",
    "spy_modifier",
    "sector_score",
    "rr_ratio",
    "short_squeeze_score",
    "gap_atr_ratio",
    "institutional_score",
];

/// Minimum resolved picks before training is attempted.
pub const MIN_TRAINING_PICKS: usize = 20;

const LEARNING_RATE: f64 = 0.1;
const EPOCHS: usize = 500;

// ============================================================================
// Persisted Model
// ============================================================================

/// Trained model state, persisted as `model_weights.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Per-feature coefficient, keyed by feature name
    pub weights: BTreeMap<String, f64>,
    pub bias: f64,
    /// Number of resolved picks the model was fit on
    pub trained_on: usize,
    pub timestamp: DateTime<Utc>,
    /// Per-column standardization mean, aligned with `feature_keys`
    pub scaler_mean: Vec<f64>,
    /// Per-column standardization scale, aligned with `feature_keys`
    pub scaler_scale: Vec<f64>,
    pub feature_keys: Vec<String>,
}

/// One resolved pick: the features as scored, and whether it won.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub features: FeatureRecord,
    pub won: bool,
}

// ============================================================================
// Training
// ============================================================================

/// Fit a standardized logistic regression on resolved picks.
///
/// Returns None when fewer than [`MIN_TRAINING_PICKS`] samples exist, in
/// which case the caller keeps whatever model it already had.
pub fn train(samples: &[TrainingSample]) -> Option<ModelWeights> {
    if samples.len() < MIN_TRAINING_PICKS {
        info!(
            resolved = samples.len(),
            needed = MIN_TRAINING_PICKS,
            "not enough resolved picks to train, keeping prior model"
        );
        return None;
    }

    let rows: Vec<Vec<f64>> = samples
        .iter()
        .map(|s| FEATURE_KEYS.iter().map(|k| s.features.value(k)).collect())
        .collect();
    let targets: Vec<f64> = samples
        .iter()
        .map(|s| if s.won { 1.0 } else { 0.0 })
        .collect();

    let (mean, scale) = fit_scaler(&rows);
    let scaled: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| standardize(row, &mean, &scale))
        .collect();

    let n = scaled.len() as f64;
    let mut weights = vec![0.0; FEATURE_KEYS.len()];
    let mut bias = 0.0;
    for _ in 0..EPOCHS {
        let mut grad_w = vec![0.0; weights.len()];
        let mut grad_b = 0.0;
        for (row, &y) in scaled.iter().zip(&targets) {
            let err = sigmoid(dot(row, &weights) + bias) - y;
            for (g, &x) in grad_w.iter_mut().zip(row) {
                *g += err * x;
            }
            grad_b += err;
        }
        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= LEARNING_RATE * g / n;
        }
        bias -= LEARNING_RATE * grad_b / n;
    }

    let model = ModelWeights {
        weights: FEATURE_KEYS
            .iter()
            .map(|k| k.to_string())
            .zip(weights)
            .collect(),
        bias,
        trained_on: samples.len(),
        timestamp: Utc::now(),
        scaler_mean: mean,
        scaler_scale: scale,
        feature_keys: FEATURE_KEYS.iter().map(|k| k.to_string()).collect(),
    };
    info!(trained_on = model.trained_on, "adjustment model trained");
    Some(model)
}

/// Signed confidence for one record, in [-1, 1], rounded to 2 decimals.
/// A missing or malformed model reads as 0.
pub fn adjustment(model: Option<&ModelWeights>, record: &FeatureRecord) -> f64 {
    let model = match model {
        Some(m) => m,
        None => return 0.0,
    };
    if model.scaler_mean.len() != model.feature_keys.len()
        || model.scaler_scale.len() != model.feature_keys.len()
    {
        return 0.0;
    }
    let row: Vec<f64> = model
        .feature_keys
        .iter()
        .map(|k| record.value(k))
        .collect();
    let scaled = standardize(&row, &model.scaler_mean, &model.scaler_scale);
    let logit: f64 = model
        .feature_keys
        .iter()
        .zip(&scaled)
        .map(|(k, &x)| model.weights.get(k).copied().unwrap_or(0.0) * x)
        .sum::<f64>()
        + model.bias;
    let prob = sigmoid(logit);
    ((prob - 0.5) * 2.0 * 100.0).round() / 100.0
}

// ============================================================================
// Internals
// ============================================================================

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Column-wise mean and population standard deviation. Zero-variance columns
/// get scale 1 so standardization never divides by zero.
fn fit_scaler(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut mean = Vec::with_capacity(cols);
    let mut scale = Vec::with_capacity(cols);
    for c in 0..cols {
        let col: Vec<f64> = rows.iter().map(|r| r[c]).collect();
        mean.push(col.iter().mean());
        let sd = col.iter().population_std_dev();
        scale.push(if sd > 0.0 { sd } else { 1.0 });
    }
    (mean, scale)
}

fn standardize(row: &[f64], mean: &[f64], scale: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(mean.iter().zip(scale))
        .map(|(&x, (&m, &s))| (x - m) / s)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
