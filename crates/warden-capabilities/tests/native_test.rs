//! The ml domain served by the reference native library, linked in process
//! and driven through its exported C functions.

use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use warden_capabilities::ml::{
    CreateModelRequest, EvaluateModelRequest, MlCore, PredictRequest, TrainModelRequest,
};
use warden_capabilities::MlCapability;
use warden_core::{
    Backend, CapabilityFacade, CapabilitySettings, ErrorKind, MemorySink, NativeError,
    NativeModule, StaticResolver,
};
use warden_ml_smoke_extension as smoke;

type OperationFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;

/// Adapter calling the smoke library's exports without `dlopen`.
struct LinkedSmokeModule;

impl LinkedSmokeModule {
    fn operation(method: &str) -> Option<OperationFn> {
        match method {
            "createModel" => Some(smoke::createModel::call),
            "trainModel" => Some(smoke::trainModel::call),
            "predict" => Some(smoke::predict::call),
            "evaluateModel" => Some(smoke::evaluateModel::call),
            _ => None,
        }
    }

    fn take_owned(ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { smoke::warden_capability_free_string(ptr) };
        Some(text)
    }
}

impl NativeModule for LinkedSmokeModule {
    fn version(&self) -> String {
        unsafe { CStr::from_ptr(smoke::warden_capability_version()) }
            .to_string_lossy()
            .into_owned()
    }

    fn initialize(&self, config: &str) -> bool {
        let config = CString::new(config).unwrap();
        unsafe { smoke::warden_capability_initialize(config.as_ptr()) }
    }

    fn call(&self, method: &str, payload: &str) -> Result<String, NativeError> {
        let op = Self::operation(method).ok_or_else(|| NativeError::MissingMethod(method.into()))?;
        let payload =
            CString::new(payload).map_err(|_| NativeError::InvalidPayload(method.into()))?;
        let out = unsafe { op(payload.as_ptr()) };
        match Self::take_owned(out) {
            Some(text) => Ok(text),
            None => match Self::take_owned(smoke::warden_capability_last_error()) {
                Some(message) => Err(NativeError::Failed {
                    method: method.into(),
                    message,
                }),
                None => Err(NativeError::NullResult(method.into())),
            },
        }
    }
}

fn native_ml() -> (MlCore, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let facade = CapabilityFacade::<MlCapability>::new(
        CapabilitySettings::new("ml").with_environment("test"),
        Arc::new(StaticResolver::new(Arc::new(LinkedSmokeModule)).with_label("linked-smoke")),
        sink.clone(),
    )
    .unwrap();
    (MlCore::new(facade), sink)
}

// ============================================================================
// Native path
// ============================================================================

#[tokio::test]
async fn test_native_library_serves_model_lifecycle() {
    let (ml, sink) = native_ml();
    assert_eq!(ml.backend(), Backend::Native);
    assert_eq!(ml.version(), "1.2.0");
    assert_eq!(sink.loads()[0].source, "linked-smoke");

    let created = ml
        .create_model(CreateModelRequest {
            name: "churn".into(),
            model_type: "logistic".into(),
            features: vec!["tenure".into(), "plan".into(), "usage".into()],
        })
        .await
        .unwrap();
    assert!(!created.is_degraded());
    let model_id = created.into_value().model_id;
    assert!(model_id.starts_with("ml-"));

    let trained = ml
        .train_model(TrainModelRequest {
            model_id: model_id.clone(),
            samples: 2000,
            epochs: 30,
        })
        .await
        .unwrap();
    assert_eq!(trained.served_by(), Backend::Native);
    assert!(trained.value().accuracy > 0.9);

    let evaluated = ml
        .evaluate_model(EvaluateModelRequest {
            model_id: model_id.clone(),
            samples: 400,
        })
        .await
        .unwrap();
    assert_eq!(evaluated.served_by(), Backend::Native);
    assert_eq!(evaluated.value().accuracy, trained.value().accuracy);

    let stats = ml.stats();
    assert_eq!(stats.native_calls, 3);
    assert_eq!(stats.degraded_calls, 0);
}

#[tokio::test]
async fn test_native_and_fallback_predictions_agree() {
    let (ml, _) = native_ml();
    let model_id = ml
        .create_model(CreateModelRequest {
            name: "parity".into(),
            model_type: "logistic".into(),
            features: vec![],
        })
        .await
        .unwrap()
        .into_value()
        .model_id;

    let native = ml
        .predict(PredictRequest {
            model_id,
            input: vec![1.0, 2.0, 3.0],
        })
        .await
        .unwrap();
    assert_eq!(native.served_by(), Backend::Native);

    let fallback = warden_capabilities::ml::fallback::predict(&PredictRequest {
        model_id: native.value().model_id.clone(),
        input: vec![1.0, 2.0, 3.0],
    })
    .unwrap();
    assert_eq!(native.value(), &fallback);
}

// ============================================================================
// Per-call degradation
// ============================================================================

#[tokio::test]
async fn test_native_error_degrades_only_that_call() {
    let (ml, sink) = native_ml();

    let result = ml
        .predict(PredictRequest {
            model_id: "never-created".into(),
            input: vec![0.0],
        })
        .await
        .unwrap();
    assert!(result.is_degraded());
    let reason = result.reason().unwrap();
    assert_eq!(reason.kind, ErrorKind::CallFailure);
    assert!(reason.message.contains("unknown model"));
    assert_eq!(result.value().prediction, 0.5);

    // The handle stays native
    assert_eq!(ml.backend(), Backend::Native);
    let created = ml
        .create_model(CreateModelRequest {
            name: "after".into(),
            model_type: "tree".into(),
            features: vec![],
        })
        .await
        .unwrap();
    assert!(!created.is_degraded());

    let records = sink.invocations();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].error_kind, Some(ErrorKind::CallFailure));
    assert!(records[1].error_kind.is_none());
    assert_eq!(ml.stats().native_failures, 1);
}

#[tokio::test]
async fn test_failed_self_check_demotes_to_fallback() {
    let facade = CapabilityFacade::<MlCapability>::new(
        CapabilitySettings::new("ml").with_environment(""),
        Arc::new(StaticResolver::new(Arc::new(LinkedSmokeModule))),
        Arc::new(MemorySink::new()),
    )
    .unwrap();
    let ml = MlCore::new(facade);

    assert_eq!(ml.backend(), Backend::Fallback);
    assert_eq!(ml.load_error().unwrap().kind, ErrorKind::LoadFailure);

    let result = ml
        .predict(PredictRequest {
            model_id: "m1".into(),
            input: vec![1.0, 2.0, 3.0],
        })
        .await
        .unwrap();
    assert!(result.is_degraded());
    assert_eq!(result.value().prediction, 0.8808);
}
