//! ML core: model lifecycle and inference.

pub mod fallback;
pub mod types;

use warden_core::prelude::*;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlOperation {
    CreateModel,
    TrainModel,
    Predict,
    EvaluateModel,
}

impl OperationKind for MlOperation {
    const ALL: &'static [Self] = &[
        MlOperation::CreateModel,
        MlOperation::TrainModel,
        MlOperation::Predict,
        MlOperation::EvaluateModel,
    ];

    fn name(&self) -> &'static str {
        match self {
            MlOperation::CreateModel => "createModel",
            MlOperation::TrainModel => "trainModel",
            MlOperation::Predict => "predict",
            MlOperation::EvaluateModel => "evaluateModel",
        }
    }

    fn idempotence(&self) -> Idempotence {
        match self {
            MlOperation::CreateModel | MlOperation::TrainModel => Idempotence::Effectful,
            MlOperation::Predict | MlOperation::EvaluateModel => Idempotence::Pure,
        }
    }
}

pub struct MlCapability;

impl Capability for MlCapability {
    const DOMAIN: &'static str = "ml";
    const FALLBACK_VERSION: &'static str = "1.0.0-fallback";
    type Operation = MlOperation;
    type Request = MlRequest;
    type Response = MlResponse;

    fn operation(request: &MlRequest) -> MlOperation {
        match request {
            MlRequest::CreateModel(_) => MlOperation::CreateModel,
            MlRequest::TrainModel(_) => MlOperation::TrainModel,
            MlRequest::Predict(_) => MlOperation::Predict,
            MlRequest::EvaluateModel(_) => MlOperation::EvaluateModel,
        }
    }

    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError> {
        DispatchTable::<Self>::builder()
            .route(
                MlOperation::CreateModel,
                "createModel",
                bind_fallback!(MlRequest, MlResponse, CreateModel, fallback::create_model),
            )
            .route(
                MlOperation::TrainModel,
                "trainModel",
                bind_fallback!(MlRequest, MlResponse, TrainModel, fallback::train_model),
            )
            .route(
                MlOperation::Predict,
                "predict",
                bind_fallback!(MlRequest, MlResponse, Predict, fallback::predict),
            )
            .route(
                MlOperation::EvaluateModel,
                "evaluateModel",
                bind_fallback!(MlRequest, MlResponse, EvaluateModel, fallback::evaluate_model),
            )
            .build()
    }
}

capability_core! {
    /// Typed facade for the ML domain.
    pub struct MlCore for MlCapability {
        request: MlRequest,
        response: MlResponse,
        operations: {
            create_model => CreateModel(CreateModelRequest) -> CreateModelResponse;
            train_model => TrainModel(TrainModelRequest) -> TrainModelResponse;
            predict => Predict(PredictRequest) -> PredictResponse;
            evaluate_model => EvaluateModel(EvaluateModelRequest) -> EvaluateModelResponse;
        }
    }
}
