//! IOC core: indicator normalization, scoring and extraction.

pub mod classify;
pub mod fallback;
pub mod types;

use warden_core::prelude::*;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IocOperation {
    ProcessIndicator,
    EnrichIndicator,
    ExtractIndicators,
}

impl OperationKind for IocOperation {
    const ALL: &'static [Self] = &[
        IocOperation::ProcessIndicator,
        IocOperation::EnrichIndicator,
        IocOperation::ExtractIndicators,
    ];

    fn name(&self) -> &'static str {
        match self {
            IocOperation::ProcessIndicator => "processIndicator",
            IocOperation::EnrichIndicator => "enrichIndicator",
            IocOperation::ExtractIndicators => "extractIndicators",
        }
    }

    fn idempotence(&self) -> Idempotence {
        Idempotence::Pure
    }
}

pub struct IocCapability;

impl Capability for IocCapability {
    const DOMAIN: &'static str = "ioc";
    const FALLBACK_VERSION: &'static str = "1.0.0-fallback";
    type Operation = IocOperation;
    type Request = IocRequest;
    type Response = IocResponse;

    fn operation(request: &IocRequest) -> IocOperation {
        match request {
            IocRequest::ProcessIndicator(_) => IocOperation::ProcessIndicator,
            IocRequest::EnrichIndicator(_) => IocOperation::EnrichIndicator,
            IocRequest::ExtractIndicators(_) => IocOperation::ExtractIndicators,
        }
    }

    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError> {
        DispatchTable::<Self>::builder()
            .route(
                IocOperation::ProcessIndicator,
                "processIndicator",
                bind_fallback!(
                    IocRequest,
                    IocResponse,
                    ProcessIndicator,
                    fallback::process_indicator
                ),
            )
            .route(
                IocOperation::EnrichIndicator,
                "enrichIndicator",
                bind_fallback!(
                    IocRequest,
                    IocResponse,
                    EnrichIndicator,
                    fallback::enrich_indicator
                ),
            )
            .route(
                IocOperation::ExtractIndicators,
                "extractIndicators",
                bind_fallback!(
                    IocRequest,
                    IocResponse,
                    ExtractIndicators,
                    fallback::extract_indicators
                ),
            )
            .build()
    }
}

capability_core! {
    /// Typed facade for the IOC domain.
    pub struct IocCore for IocCapability {
        request: IocRequest,
        response: IocResponse,
        operations: {
            process_indicator =>
                ProcessIndicator(ProcessIndicatorRequest) -> ProcessIndicatorResponse;
            enrich_indicator => EnrichIndicator(EnrichIndicatorRequest) -> EnrichIndicatorResponse;
            extract_indicators =>
                ExtractIndicators(ExtractIndicatorsRequest) -> ExtractIndicatorsResponse;
        }
    }
}
