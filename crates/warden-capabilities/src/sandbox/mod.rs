//! Sandbox core: sample submission and behaviour analysis.

pub mod fallback;
pub mod types;

use warden_core::prelude::*;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxOperation {
    SubmitSample,
    GetReport,
    AnalyzeBehavior,
}

impl OperationKind for SandboxOperation {
    const ALL: &'static [Self] = &[
        SandboxOperation::SubmitSample,
        SandboxOperation::GetReport,
        SandboxOperation::AnalyzeBehavior,
    ];

    fn name(&self) -> &'static str {
        match self {
            SandboxOperation::SubmitSample => "submitSample",
            SandboxOperation::GetReport => "getReport",
            SandboxOperation::AnalyzeBehavior => "analyzeBehavior",
        }
    }

    fn idempotence(&self) -> Idempotence {
        match self {
            SandboxOperation::SubmitSample => Idempotence::Effectful,
            SandboxOperation::GetReport | SandboxOperation::AnalyzeBehavior => Idempotence::Pure,
        }
    }
}

pub struct SandboxCapability;

impl Capability for SandboxCapability {
    const DOMAIN: &'static str = "sandbox";
    const FALLBACK_VERSION: &'static str = "1.0.0-fallback";
    type Operation = SandboxOperation;
    type Request = SandboxRequest;
    type Response = SandboxResponse;

    fn operation(request: &SandboxRequest) -> SandboxOperation {
        match request {
            SandboxRequest::SubmitSample(_) => SandboxOperation::SubmitSample,
            SandboxRequest::GetReport(_) => SandboxOperation::GetReport,
            SandboxRequest::AnalyzeBehavior(_) => SandboxOperation::AnalyzeBehavior,
        }
    }

    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError> {
        DispatchTable::<Self>::builder()
            .route(
                SandboxOperation::SubmitSample,
                "submitSample",
                bind_fallback!(
                    SandboxRequest,
                    SandboxResponse,
                    SubmitSample,
                    fallback::submit_sample
                ),
            )
            .route(
                SandboxOperation::GetReport,
                "getReport",
                bind_fallback!(SandboxRequest, SandboxResponse, GetReport, fallback::get_report),
            )
            .route(
                SandboxOperation::AnalyzeBehavior,
                "analyzeBehavior",
                bind_fallback!(
                    SandboxRequest,
                    SandboxResponse,
                    AnalyzeBehavior,
                    fallback::analyze_behavior
                ),
            )
            .build()
    }
}

capability_core! {
    /// Typed facade for the sandbox domain.
    pub struct SandboxCore for SandboxCapability {
        request: SandboxRequest,
        response: SandboxResponse,
        operations: {
            submit_sample => SubmitSample(SubmitSampleRequest) -> SubmitSampleResponse;
            get_report => GetReport(GetReportRequest) -> GetReportResponse;
            analyze_behavior => AnalyzeBehavior(AnalyzeBehaviorRequest) -> AnalyzeBehaviorResponse;
        }
    }
}
