//! ML request and response shapes.

use serde::{Deserialize, Serialize};
use warden_core::operation::{check_not_blank, check_unit_interval};
use warden_core::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    pub name: String,
    pub model_type: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelResponse {
    pub model_id: String,
    pub name: String,
    pub model_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainModelRequest {
    pub model_id: String,
    pub samples: u64,
    pub epochs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainModelResponse {
    pub model_id: String,
    pub accuracy: f64,
    pub loss: f64,
    pub epochs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub model_id: String,
    pub input: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub model_id: String,
    pub prediction: f64,
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateModelRequest {
    pub model_id: String,
    pub samples: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateModelResponse {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum MlRequest {
    #[serde(rename = "createModel")]
    CreateModel(CreateModelRequest),
    #[serde(rename = "trainModel")]
    TrainModel(TrainModelRequest),
    #[serde(rename = "predict")]
    Predict(PredictRequest),
    #[serde(rename = "evaluateModel")]
    EvaluateModel(EvaluateModelRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum MlResponse {
    #[serde(rename = "createModel")]
    CreateModel(CreateModelResponse),
    #[serde(rename = "trainModel")]
    TrainModel(TrainModelResponse),
    #[serde(rename = "predict")]
    Predict(PredictResponse),
    #[serde(rename = "evaluateModel")]
    EvaluateModel(EvaluateModelResponse),
}

impl Validate for MlRequest {
    fn validate(&self) -> Result<(), String> {
        match self {
            MlRequest::CreateModel(r) => {
                check_not_blank("name", &r.name)?;
                check_not_blank("modelType", &r.model_type)
            }
            MlRequest::TrainModel(r) => {
                check_not_blank("modelId", &r.model_id)?;
                if r.epochs == 0 {
                    return Err("epochs must be at least 1".into());
                }
                Ok(())
            }
            MlRequest::Predict(r) => {
                check_not_blank("modelId", &r.model_id)?;
                if r.input.is_empty() {
                    return Err("input must not be empty".into());
                }
                if r.input.iter().any(|x| !x.is_finite()) {
                    return Err("input contains a non-finite value".into());
                }
                Ok(())
            }
            MlRequest::EvaluateModel(r) => check_not_blank("modelId", &r.model_id),
        }
    }
}

impl Validate for MlResponse {
    fn validate(&self) -> Result<(), String> {
        match self {
            MlResponse::CreateModel(r) => {
                check_not_blank("modelId", &r.model_id)?;
                check_not_blank("status", &r.status)
            }
            MlResponse::TrainModel(r) => {
                check_unit_interval("accuracy", r.accuracy)?;
                if !r.loss.is_finite() || r.loss < 0.0 {
                    return Err(format!("loss = {} must be finite and non-negative", r.loss));
                }
                Ok(())
            }
            MlResponse::Predict(r) => {
                if !r.prediction.is_finite() {
                    return Err("prediction is not finite".into());
                }
                check_unit_interval("confidence", r.confidence)
            }
            MlResponse::EvaluateModel(r) => {
                check_unit_interval("accuracy", r.accuracy)?;
                check_unit_interval("precision", r.precision)?;
                check_unit_interval("recall", r.recall)?;
                check_unit_interval("f1Score", r.f1_score)
            }
        }
    }
}
