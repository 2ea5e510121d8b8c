//! CVE core: vulnerability scoring and prioritisation.

pub mod cvss;
pub mod fallback;
pub mod types;

use warden_core::prelude::*;

pub use cvss::Severity;
pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CveOperation {
    AnalyzeCve,
    ScoreVector,
    Prioritize,
}

impl OperationKind for CveOperation {
    const ALL: &'static [Self] = &[
        CveOperation::AnalyzeCve,
        CveOperation::ScoreVector,
        CveOperation::Prioritize,
    ];

    fn name(&self) -> &'static str {
        match self {
            CveOperation::AnalyzeCve => "analyzeCve",
            CveOperation::ScoreVector => "scoreVector",
            CveOperation::Prioritize => "prioritize",
        }
    }

    fn idempotence(&self) -> Idempotence {
        Idempotence::Pure
    }
}

pub struct CveCapability;

impl Capability for CveCapability {
    const DOMAIN: &'static str = "cve";
    const FALLBACK_VERSION: &'static str = "1.0.0-fallback";
    type Operation = CveOperation;
    type Request = CveRequest;
    type Response = CveResponse;

    fn operation(request: &CveRequest) -> CveOperation {
        match request {
            CveRequest::AnalyzeCve(_) => CveOperation::AnalyzeCve,
            CveRequest::ScoreVector(_) => CveOperation::ScoreVector,
            CveRequest::Prioritize(_) => CveOperation::Prioritize,
        }
    }

    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError> {
        DispatchTable::<Self>::builder()
            .route(
                CveOperation::AnalyzeCve,
                "analyzeCve",
                bind_fallback!(CveRequest, CveResponse, AnalyzeCve, fallback::analyze_cve),
            )
            .route(
                CveOperation::ScoreVector,
                "scoreVector",
                bind_fallback!(CveRequest, CveResponse, ScoreVector, fallback::score_vector),
            )
            .route(
                CveOperation::Prioritize,
                "prioritize",
                bind_fallback!(CveRequest, CveResponse, Prioritize, fallback::prioritize),
            )
            .build()
    }
}

capability_core! {
    /// Typed facade for the CVE domain.
    pub struct CveCore for CveCapability {
        request: CveRequest,
        response: CveResponse,
        operations: {
            analyze_cve => AnalyzeCve(AnalyzeCveRequest) -> AnalyzeCveResponse;
            score_vector => ScoreVector(ScoreVectorRequest) -> ScoreVectorResponse;
            prioritize => Prioritize(PrioritizeRequest) -> PrioritizeResponse;
        }
    }
}
