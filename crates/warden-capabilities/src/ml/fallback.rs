//! Synthetic ML fallback.
//!
//! No model is trained or stored. Ids and sampled metrics derive from the
//! request digest, so identical requests give identical answers.

use rand::Rng;
use warden_core::FallbackError;

use super::types::*;
use crate::seed::{round_to, RequestSeed};

/// Range that fallback accuracy is sampled from.
pub const ACCURACY_RANGE: (f64, f64) = (0.80, 0.95);

pub fn create_model(req: &CreateModelRequest) -> Result<CreateModelResponse, FallbackError> {
    Ok(CreateModelResponse {
        model_id: RequestSeed::of("createModel", req).fallback_id(),
        name: req.name.clone(),
        model_type: req.model_type.clone(),
        status: "created".to_string(),
    })
}

pub fn train_model(req: &TrainModelRequest) -> Result<TrainModelResponse, FallbackError> {
    let mut rng = RequestSeed::of("trainModel", req).rng();
    let accuracy = rng.gen_range(ACCURACY_RANGE.0..=ACCURACY_RANGE.1);
    // Loss shrinks with epochs but never reaches zero
    let loss = (1.0 - accuracy) * (1.0 + 1.0 / f64::from(req.epochs.max(1)));
    Ok(TrainModelResponse {
        model_id: req.model_id.clone(),
        accuracy: round_to(accuracy, 4),
        loss: round_to(loss, 4),
        epochs: req.epochs,
    })
}

pub fn predict(req: &PredictRequest) -> Result<PredictResponse, FallbackError> {
    if req.input.is_empty() {
        return Err(FallbackError::InvalidRequest("input must not be empty".into()));
    }
    let mean = req.input.iter().sum::<f64>() / req.input.len() as f64;
    let prediction = 1.0 / (1.0 + (-mean).exp());
    let confidence = ((prediction - 0.5).abs() * 2.0).clamp(0.0, 1.0);
    Ok(PredictResponse {
        model_id: req.model_id.clone(),
        prediction: round_to(prediction, 4),
        label: if prediction >= 0.5 { "positive" } else { "negative" }.to_string(),
        confidence: round_to(confidence, 4),
    })
}

pub fn evaluate_model(req: &EvaluateModelRequest) -> Result<EvaluateModelResponse, FallbackError> {
    let mut rng = RequestSeed::of("evaluateModel", req).rng();
    let accuracy = rng.gen_range(ACCURACY_RANGE.0..=ACCURACY_RANGE.1);
    let precision = rng.gen_range(0.75..=0.95);
    let recall = rng.gen_range(0.75..=0.95);
    let f1 = 2.0 * precision * recall / (precision + recall);
    Ok(EvaluateModelResponse {
        accuracy: round_to(accuracy, 4),
        precision: round_to(precision, 4),
        recall: round_to(recall, 4),
        f1_score: round_to(f1, 4),
    })
}
