//! Core of the Warden capability proxy layer.
//!
//! A capability domain is served by a native library when one loads and
//! passes its self-check, and by a pure in-process fallback otherwise.
//! Callers only see [`CapabilityFacade`]; which path served a call is
//! reported through [`InvocationResult`] and diagnostic events.

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod handle;
pub mod loader;
pub mod operation;

pub use codec::JsonCodec;
pub use config::{env_vars, CapabilitySettings, InitConfig};
pub use diagnostics::{
    BroadcastSink, DiagnosticEvent, DiagnosticSink, FanoutSink, InvocationRecord, LoadEvent,
    MemorySink, TracingSink, DEFAULT_CHANNEL_CAPACITY,
};
pub use dispatch::{DispatchTable, DispatchTableBuilder, FallbackFn, Route};
pub use error::{
    CallError, CodecError, DispatchError, ErrorDetail, ErrorKind, FallbackError, LoadError,
    NativeError, ProxyError, Result,
};
pub use facade::{CapabilityFacade, CapabilityStatus, InvocationResult, OperationInfo, Served};
pub use handle::{Backend, CapabilityHandle, StatsSnapshot, UNHEALTHY_FAILURE_THRESHOLD};
pub use loader::{
    resolver_for, CapabilityLoader, DylibModule, DylibResolver, ModuleResolver, NativeModule,
    StaticResolver, UnavailableResolver,
};
pub use operation::{Capability, Idempotence, OperationKind, Validate};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::bind_fallback;
    pub use crate::config::CapabilitySettings;
    pub use crate::diagnostics::{DiagnosticSink, MemorySink, TracingSink};
    pub use crate::dispatch::DispatchTable;
    pub use crate::error::{DispatchError, FallbackError, ProxyError};
    pub use crate::facade::{CapabilityFacade, InvocationResult, Served};
    pub use crate::handle::Backend;
    pub use crate::operation::{
        check_not_blank, check_range, check_unit_interval, Capability, Idempotence,
        OperationKind, Validate,
    };
}
