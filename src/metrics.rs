use serde::Serialize;

/// Probabilities are clipped away from 0 and 1 before taking logs.
const EPSILON: f64 = 1e-15;

/// Mean negative log-likelihood of `targets` under the predicted
/// probabilities of the positive class.
pub fn log_loss(targets: &[f64], probabilities: &[f64]) -> f64 {
    debug_assert_eq!(targets.len(), probabilities.len());
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = targets
        .iter()
        .zip(probabilities)
        .map(|(y, p)| {
            let p = p.clamp(EPSILON, 1.0 - EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / targets.len() as f64
}

/// Share of rows whose thresholded prediction matches the target.
pub fn accuracy(targets: &[f64], probabilities: &[f64], threshold: f64) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let correct = targets
        .iter()
        .zip(probabilities)
        .filter(|(y, p)| (**p >= threshold) == (**y >= 0.5))
        .count();
    correct as f64 / targets.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub false_positive_rates: Vec<f64>,
    pub true_positive_rates: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.false_positive_rates
            .iter()
            .copied()
            .zip(self.true_positive_rates.iter().copied())
            .collect()
    }

    /// Area under the curve by the trapezoid rule.
    pub fn auc(&self) -> f64 {
        self.points()
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
            .sum()
    }
}

/// Builds the ROC curve with one point per distinct score, starting at
/// (0, 0) with an infinite threshold.
pub fn roc_curve(targets: &[f64], scores: &[f64]) -> RocCurve {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let positives = targets.iter().filter(|y| **y >= 0.5).count() as f64;
    let negatives = targets.len() as f64 - positives;
    let rate = |count: f64, total: f64| if total > 0.0 { count / total } else { 0.0 };

    let mut curve = RocCurve {
        false_positive_rates: vec![0.0],
        true_positive_rates: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut true_positives, mut false_positives) = (0.0, 0.0);
    for (i, &row) in order.iter().enumerate() {
        if targets[row] >= 0.5 {
            true_positives += 1.0;
        } else {
            false_positives += 1.0;
        }
        let last_of_threshold = order
            .get(i + 1)
            .map_or(true, |next| scores[*next] != scores[row]);
        if last_of_threshold {
            curve.false_positive_rates.push(rate(false_positives, negatives));
            curve.true_positive_rates.push(rate(true_positives, positives));
            curve.thresholds.push(scores[row]);
        }
    }
    curve
}
