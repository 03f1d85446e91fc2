use crate::columns::SparseRow;

pub trait Classifier {
    /// Advances the optimizer by `steps` full-batch steps.
    fn fit(&mut self, rows: &[SparseRow], labels: &[f64], steps: usize);
    /// Probability of the positive class for each row.
    fn predict_proba(&self, rows: &[SparseRow]) -> Vec<f64>;
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic regression over sparse rows, trained with plain gradient descent
/// on the mean log loss.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    gradient_clip_norm: Option<f64>,
    steps_taken: usize,
}

impl LinearClassifier {
    pub fn new(dimension: usize, learning_rate: f64, gradient_clip_norm: Option<f64>) -> Self {
        LinearClassifier {
            weights: vec![0.0; dimension],
            bias: 0.0,
            learning_rate,
            gradient_clip_norm,
            steps_taken: 0,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    fn logit(&self, row: &SparseRow) -> f64 {
        row.iter().fold(self.bias, |acc, (index, value)| acc + self.weights[*index] * value)
    }

    /// Gradient of the mean log loss with respect to the weights and bias.
    fn gradient(&self, rows: &[SparseRow], labels: &[f64]) -> (Vec<f64>, f64) {
        let mut weight_grad = vec![0.0; self.weights.len()];
        let mut bias_grad = 0.0;
        if rows.is_empty() {
            return (weight_grad, bias_grad);
        }
        let n = rows.len() as f64;
        for (row, label) in rows.iter().zip(labels) {
            let residual = (sigmoid(self.logit(row)) - label) / n;
            for (index, value) in row {
                weight_grad[*index] += residual * value;
            }
            bias_grad += residual;
        }
        (weight_grad, bias_grad)
    }

    fn step(&mut self, rows: &[SparseRow], labels: &[f64]) {
        let (mut weight_grad, mut bias_grad) = self.gradient(rows, labels);
        if let Some(clip) = self.gradient_clip_norm {
            clip_by_global_norm(&mut weight_grad, &mut bias_grad, clip);
        }
        for (w, g) in self.weights.iter_mut().zip(&weight_grad) {
            *w -= self.learning_rate * g;
        }
        self.bias -= self.learning_rate * bias_grad;
        self.steps_taken += 1;
    }
}

/// Rescales the gradient so its L2 norm is at most `clip`.
fn clip_by_global_norm(weight_grad: &mut [f64], bias_grad: &mut f64, clip: f64) {
    let norm = (weight_grad.iter().map(|g| g * g).sum::<f64>() + *bias_grad * *bias_grad).sqrt();
    if norm > clip && norm > 0.0 {
        let factor = clip / norm;
        weight_grad.iter_mut().for_each(|g| *g *= factor);
        *bias_grad *= factor;
    }
}

impl Classifier for LinearClassifier {
    fn fit(&mut self, rows: &[SparseRow], labels: &[f64], steps: usize) {
        for _ in 0..steps {
            self.step(rows, labels);
        }
    }

    fn predict_proba(&self, rows: &[SparseRow]) -> Vec<f64> {
        rows.iter().map(|row| sigmoid(self.logit(row))).collect()
    }
}
