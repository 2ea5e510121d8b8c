//! Shared fixtures: a small two-operation capability and a scriptable
//! native module.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_core::prelude::*;
use warden_core::{LoadError, ModuleResolver, NativeError, NativeModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcOperation {
    Sum,
    Record,
}

impl OperationKind for CalcOperation {
    const ALL: &'static [Self] = &[CalcOperation::Sum, CalcOperation::Record];

    fn name(&self) -> &'static str {
        match self {
            CalcOperation::Sum => "sum",
            CalcOperation::Record => "record",
        }
    }

    fn idempotence(&self) -> Idempotence {
        match self {
            CalcOperation::Sum => Idempotence::Pure,
            CalcOperation::Record => Idempotence::Effectful,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumRequest {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumResponse {
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum CalcRequest {
    #[serde(rename = "sum")]
    Sum(SumRequest),
    #[serde(rename = "record")]
    Record(RecordRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum CalcResponse {
    #[serde(rename = "sum")]
    Sum(SumResponse),
    #[serde(rename = "record")]
    Record(RecordResponse),
}

impl Validate for CalcRequest {
    fn validate(&self) -> Result<(), String> {
        match self {
            CalcRequest::Sum(r) if r.values.is_empty() => Err("values must not be empty".into()),
            CalcRequest::Sum(_) => Ok(()),
            CalcRequest::Record(r) => check_not_blank("label", &r.label),
        }
    }
}

impl Validate for CalcResponse {
    fn validate(&self) -> Result<(), String> {
        match self {
            CalcResponse::Sum(r) if r.count == 0 => Err("count must be positive".into()),
            CalcResponse::Sum(_) => Ok(()),
            CalcResponse::Record(r) => check_not_blank("id", &r.id),
        }
    }
}

fn sum_fallback(req: &SumRequest) -> Result<SumResponse, FallbackError> {
    Ok(SumResponse {
        total: req.values.iter().sum(),
        count: req.values.len(),
    })
}

fn record_fallback(req: &RecordRequest) -> Result<RecordResponse, FallbackError> {
    if req.label == "fail" {
        return Err(FallbackError::Failed("label rejected".into()));
    }
    if req.label == "explode" {
        panic!("record fallback exploded");
    }
    Ok(RecordResponse {
        id: format!("fb-{}", req.label),
    })
}

pub struct Calc;

impl Capability for Calc {
    const DOMAIN: &'static str = "calc";
    const FALLBACK_VERSION: &'static str = "1.0.0-fallback";
    type Operation = CalcOperation;
    type Request = CalcRequest;
    type Response = CalcResponse;

    fn operation(request: &CalcRequest) -> CalcOperation {
        match request {
            CalcRequest::Sum(_) => CalcOperation::Sum,
            CalcRequest::Record(_) => CalcOperation::Record,
        }
    }

    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError> {
        DispatchTable::<Self>::builder()
            .route(
                CalcOperation::Sum,
                "sum",
                bind_fallback!(CalcRequest, CalcResponse, Sum, sum_fallback),
            )
            .route(
                CalcOperation::Record,
                "record",
                bind_fallback!(CalcRequest, CalcResponse, Record, record_fallback),
            )
            .build()
    }
}

pub fn sum(values: &[f64]) -> CalcRequest {
    CalcRequest::Sum(SumRequest {
        values: values.to_vec(),
    })
}

pub fn record(label: &str) -> CalcRequest {
    CalcRequest::Record(RecordRequest {
        label: label.into(),
    })
}

type Script = dyn Fn(usize, &str, &str) -> Result<String, NativeError> + Send + Sync;

/// Native module whose every call is answered by a closure receiving the
/// zero-based call index, the method, and the payload.
pub struct ScriptedModule {
    version: String,
    accept: bool,
    calls: AtomicUsize,
    script: Box<Script>,
}

impl ScriptedModule {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize, &str, &str) -> Result<String, NativeError> + Send + Sync + 'static,
    {
        Self {
            version: "2.0.0".into(),
            accept: true,
            calls: AtomicUsize::new(0),
            script: Box::new(script),
        }
    }

    /// Computes `sum` natively and echoes a native id for `record`.
    pub fn working() -> Self {
        Self::new(|_, method, payload| native_answer(method, payload))
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.into();
        self
    }

    pub fn rejecting_init(mut self) -> Self {
        self.accept = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NativeModule for ScriptedModule {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn initialize(&self, config: &str) -> bool {
        self.accept && config.contains("environment")
    }

    fn call(&self, method: &str, payload: &str) -> Result<String, NativeError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(index, method, payload)
    }
}

/// Correct native behaviour for the calc domain.
pub fn native_answer(method: &str, payload: &str) -> Result<String, NativeError> {
    match method {
        "sum" => {
            let req: SumRequest = serde_json::from_str(payload).map_err(|e| NativeError::Failed {
                method: method.into(),
                message: e.to_string(),
            })?;
            let total: f64 = req.values.iter().sum();
            Ok(serde_json::json!({"total": total, "count": req.values.len()}).to_string())
        }
        "record" => {
            let req: RecordRequest =
                serde_json::from_str(payload).map_err(|e| NativeError::Failed {
                    method: method.into(),
                    message: e.to_string(),
                })?;
            Ok(serde_json::json!({"id": format!("native-{}", req.label)}).to_string())
        }
        other => Err(NativeError::MissingMethod(other.into())),
    }
}

/// Resolver that counts how often it is asked for a module.
pub struct CountingResolver {
    module: Option<Arc<dyn NativeModule>>,
    pub resolutions: AtomicUsize,
    delay: Option<std::time::Duration>,
}

impl CountingResolver {
    pub fn serving(module: Arc<dyn NativeModule>) -> Self {
        Self {
            module: Some(module),
            resolutions: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            module: None,
            resolutions: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

impl ModuleResolver for CountingResolver {
    fn source(&self) -> String {
        "counting".into()
    }

    fn resolve(
        &self,
        _domain: &str,
        _methods: &[&'static str],
    ) -> Result<Arc<dyn NativeModule>, LoadError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.module
            .clone()
            .ok_or_else(|| LoadError::NotFound("libcalc".into()))
    }
}

pub fn facade_with(
    settings: CapabilitySettings,
    resolver: Arc<dyn ModuleResolver>,
    sink: Arc<MemorySink>,
) -> CapabilityFacade<Calc> {
    CapabilityFacade::<Calc>::new(settings, resolver, sink).expect("calc table is complete")
}
