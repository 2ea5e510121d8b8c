//! Reference native library for the `ml` capability.
//!
//! Keeps an in-memory model registry so the host's native path can be
//! exercised end to end: models must be created before training and
//! trained before evaluation. Predictions work for any known model.
//!
//! Build with `cargo build -p warden-ml-smoke-extension` and point
//! `WARDEN_ML_LIBRARY` at the resulting shared library.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use warden_extension_sdk::prelude::*;

#[derive(Debug, Clone)]
struct Model {
    name: String,
    model_type: String,
    features: usize,
    accuracy: Option<f64>,
}

static MODELS: Lazy<Mutex<HashMap<String, Model>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Deserialize)]
struct InitConfig {
    environment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateModelRequest {
    name: String,
    model_type: String,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateModelResponse {
    model_id: String,
    name: String,
    model_type: String,
    status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainModelRequest {
    model_id: String,
    samples: u64,
    epochs: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainModelResponse {
    model_id: String,
    accuracy: f64,
    loss: f64,
    epochs: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    model_id: String,
    input: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    model_id: String,
    prediction: f64,
    label: &'static str,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateModelRequest {
    model_id: String,
    samples: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateModelResponse {
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1_score: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn unknown_model(id: &str) -> CapabilityError {
    CapabilityError::Failed(format!("unknown model '{}'", id))
}

fn init(config: &str) -> bool {
    serde_json::from_str::<InitConfig>(config)
        .map(|c| !c.environment.trim().is_empty())
        .unwrap_or(false)
}

fn create_model(payload: &str) -> CapabilityResult<String> {
    handle_json(payload, |req: CreateModelRequest| {
        let model_id = format!("ml-{:06}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        MODELS.lock().insert(
            model_id.clone(),
            Model {
                name: req.name.clone(),
                model_type: req.model_type.clone(),
                features: req.features.len(),
                accuracy: None,
            },
        );
        Ok(CreateModelResponse {
            model_id,
            name: req.name,
            model_type: req.model_type,
            status: "created",
        })
    })
}

fn train_model(payload: &str) -> CapabilityResult<String> {
    handle_json(payload, |req: TrainModelRequest| {
        if req.epochs == 0 {
            return Err(CapabilityError::InvalidInput("epochs must be at least 1".into()));
        }
        let mut models = MODELS.lock();
        let model = models
            .get_mut(&req.model_id)
            .ok_or_else(|| unknown_model(&req.model_id))?;

        // Saturating learning curve; more data and more epochs help
        let data = (req.samples as f64 / 1_000.0).min(1.0);
        let progress = 1.0 - (-(f64::from(req.epochs)) / 10.0).exp();
        let accuracy = round4(0.5 + 0.45 * progress * data.max(0.1));
        model.accuracy = Some(accuracy);

        Ok(TrainModelResponse {
            model_id: req.model_id,
            accuracy,
            loss: round4(1.0 - accuracy),
            epochs: req.epochs,
        })
    })
}

fn predict(payload: &str) -> CapabilityResult<String> {
    handle_json(payload, |req: PredictRequest| {
        if req.input.is_empty() || req.input.iter().any(|v| !v.is_finite()) {
            return Err(CapabilityError::InvalidInput("input must be non-empty and finite".into()));
        }
        let models = MODELS.lock();
        let model = models
            .get(&req.model_id)
            .ok_or_else(|| unknown_model(&req.model_id))?;

        // Width-normalised mean so wider feature sets do not saturate
        let width = model.features.max(req.input.len()) as f64;
        let mean = req.input.iter().sum::<f64>() / width;
        let prediction = 1.0 / (1.0 + (-mean).exp());
        Ok(PredictResponse {
            model_id: req.model_id,
            prediction: round4(prediction),
            label: if prediction >= 0.5 { "positive" } else { "negative" },
            confidence: round4(((prediction - 0.5).abs() * 2.0).min(1.0)),
        })
    })
}

fn evaluate_model(payload: &str) -> CapabilityResult<String> {
    handle_json(payload, |req: EvaluateModelRequest| {
        let models = MODELS.lock();
        let model = models
            .get(&req.model_id)
            .ok_or_else(|| unknown_model(&req.model_id))?;
        let accuracy = model.accuracy.ok_or_else(|| {
            CapabilityError::Failed(format!(
                "model '{}' ({} {}) has not been trained",
                req.model_id, model.model_type, model.name
            ))
        })?;

        // Small held-out sets widen the gap between precision and recall
        let spread = 0.05 / (1.0 + req.samples as f64 / 100.0);
        let precision = round4((accuracy + spread).min(1.0));
        let recall = round4((accuracy - spread).max(0.0));
        let f1_score = round4(2.0 * precision * recall / (precision + recall));
        Ok(EvaluateModelResponse {
            accuracy,
            precision,
            recall,
            f1_score,
        })
    })
}

export_capability! {
    domain: "ml",
    version: "1.2.0",
    initialize: init,
    operations: {
        createModel => create_model,
        trainModel => train_model,
        predict => predict,
        evaluateModel => evaluate_model,
    }
}
