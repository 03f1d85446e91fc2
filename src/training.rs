use serde::Serialize;

use crate::classifier::Classifier;
use crate::columns::{FeatureLayout, SparseRow};
use crate::metrics::{accuracy, log_loss, roc_curve, RocCurve};
use crate::prepare::PreparedFrame;

/// Encoded rows of one partition with their labels.
pub struct EncodedSet {
    pub rows: Vec<SparseRow>,
    pub labels: Vec<f64>,
}

impl EncodedSet {
    pub fn encode(layout: &FeatureLayout, frame: &PreparedFrame) -> Self {
        EncodedSet {
            rows: layout.encode(frame),
            labels: frame.labels_f64(),
        }
    }

    pub fn loss<C: Classifier>(&self, model: &C) -> f64 {
        log_loss(&self.labels, &model.predict_proba(&self.rows))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Untrained,
    Period(usize),
    Trained,
}

/// Step budget split into equally sized periods.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub steps: usize,
    pub periods: usize,
}

impl Schedule {
    pub fn steps_per_period(&self) -> usize {
        self.steps / self.periods.max(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub training_losses: Vec<f64>,
    pub validation_losses: Vec<f64>,
    pub validation_accuracy: f64,
    pub auc: f64,
    pub roc: RocCurve,
}

impl TrainingReport {
    pub fn final_training_loss(&self) -> f64 {
        self.training_losses.last().copied().unwrap_or(f64::NAN)
    }

    pub fn final_validation_loss(&self) -> f64 {
        self.validation_losses.last().copied().unwrap_or(f64::NAN)
    }
}

/// Drives a classifier through the schedule, recording both partitions'
/// losses after every period.
pub struct TrainingLoop<'a, C: Classifier> {
    model: &'a mut C,
    schedule: Schedule,
    state: TrainingState,
}

impl<'a, C: Classifier> TrainingLoop<'a, C> {
    pub fn new(model: &'a mut C, schedule: Schedule) -> Self {
        TrainingLoop { model, schedule, state: TrainingState::Untrained }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn run(&mut self, training: &EncodedSet, validation: &EncodedSet) -> TrainingReport {
        let steps_per_period = self.schedule.steps_per_period();
        println!("Training model...");
        let mut training_losses = Vec::with_capacity(self.schedule.periods);
        let mut validation_losses = Vec::with_capacity(self.schedule.periods);

        for period in 0..self.schedule.periods {
            self.state = TrainingState::Period(period);
            tracing::debug!(period, steps_per_period, "training period started");
            self.model.fit(&training.rows, &training.labels, steps_per_period);

            let training_loss = training.loss(&*self.model);
            let validation_loss = validation.loss(&*self.model);
            if !training_loss.is_finite() || !validation_loss.is_finite() {
                tracing::warn!(
                    period,
                    training_loss,
                    validation_loss,
                    "loss is not finite; lower the learning rate or step count"
                );
            }
            training_losses.push(training_loss);
            validation_losses.push(validation_loss);
            println!("  Training loss after period {:02} : {:0.3}", period, training_loss);
        }
        self.state = TrainingState::Trained;

        let probabilities = self.model.predict_proba(&validation.rows);
        let roc = roc_curve(&validation.labels, &probabilities);
        let report = TrainingReport {
            training_losses,
            validation_losses,
            validation_accuracy: accuracy(&validation.labels, &probabilities, 0.5),
            auc: roc.auc(),
            roc,
        };
        println!("Final Training Loss: {:0.3}", report.final_training_loss());
        println!("Final Validation Loss: {:0.3}", report.final_validation_loss());
        tracing::info!(
            auc = report.auc,
            accuracy = report.validation_accuracy,
            "validation metrics"
        );
        report
    }
}
