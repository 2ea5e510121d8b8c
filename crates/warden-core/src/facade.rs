//! Capability facade: the only entry point callers use.
//!
//! Each invocation resolves the handle once, validates the request, and
//! then either runs the native method off the async runtime or the bound
//! fallback. A native failure of any kind is answered by the fallback for
//! that call only; the handle stays native. Exactly one
//! [`InvocationRecord`] is emitted per invocation, errors included.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_extension_sdk::ffi::panic_message;

use crate::codec::JsonCodec;
use crate::config::CapabilitySettings;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, InvocationRecord};
use crate::dispatch::DispatchTable;
use crate::error::{
    CallError, DispatchError, ErrorDetail, ErrorKind, FallbackError, NativeError, ProxyError,
    Result,
};
use crate::handle::{Backend, CapabilityHandle, StatsSnapshot};
use crate::loader::{resolver_for, CapabilityLoader, ModuleResolver};
use crate::operation::{Capability, Idempotence, OperationKind, Validate};

/// Which path produced a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Served<T> {
    Native(T),
    Fallback {
        value: T,
        /// Why the native path did not serve
        reason: ErrorDetail,
    },
}

/// Response plus the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult<T> {
    pub served: Served<T>,
    pub latency_ms: f64,
}

impl<T> InvocationResult<T> {
    pub fn value(&self) -> &T {
        match &self.served {
            Served::Native(value) | Served::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self.served {
            Served::Native(value) | Served::Fallback { value, .. } => value,
        }
    }

    pub fn served_by(&self) -> Backend {
        served_backend(&self.served)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.served, Served::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&ErrorDetail> {
        match &self.served {
            Served::Native(_) => None,
            Served::Fallback { reason, .. } => Some(reason),
        }
    }

    /// Convert the value, keeping the path and latency.
    pub fn try_map<U, E>(
        self,
        f: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<InvocationResult<U>, E> {
        let served = match self.served {
            Served::Native(value) => Served::Native(f(value)?),
            Served::Fallback { value, reason } => Served::Fallback {
                value: f(value)?,
                reason,
            },
        };
        Ok(InvocationResult {
            served,
            latency_ms: self.latency_ms,
        })
    }
}

/// One entry of [`CapabilityFacade::operations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub name: String,
    pub native_method: String,
    pub idempotence: Idempotence,
}

/// Load status of one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub domain: String,
    pub backend: Backend,
    pub loaded: bool,
    pub version: String,
    pub healthy: bool,
    pub loaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<ErrorDetail>,
    pub stats: StatsSnapshot,
}

/// Facade over one capability domain.
pub struct CapabilityFacade<C: Capability> {
    table: DispatchTable<C>,
    loader: CapabilityLoader,
    sink: Arc<dyn DiagnosticSink>,
    native_timeout: Option<Duration>,
}

impl<C: Capability> CapabilityFacade<C> {
    /// Build a facade. Fails only if the domain's dispatch table is incomplete.
    pub fn new(
        settings: CapabilitySettings,
        resolver: Arc<dyn ModuleResolver>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> std::result::Result<Self, DispatchError> {
        let table = C::dispatch_table()?;
        if settings.domain != C::DOMAIN {
            tracing::warn!(
                domain = C::DOMAIN,
                configured = %settings.domain,
                "Settings were built for another domain"
            );
        }
        let native_timeout = settings.native_timeout;
        let loader = CapabilityLoader::new(
            C::DOMAIN,
            C::FALLBACK_VERSION,
            table.native_methods(),
            settings,
            resolver,
            sink.clone(),
        );
        Ok(Self {
            table,
            loader,
            sink,
            native_timeout,
        })
    }

    /// Build a facade whose resolver follows `settings.library_path`.
    pub fn from_settings(
        settings: CapabilitySettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> std::result::Result<Self, DispatchError> {
        let resolver = resolver_for(&settings);
        Self::new(settings, resolver, sink)
    }

    /// Build a facade configured from the process environment.
    pub fn from_env(sink: Arc<dyn DiagnosticSink>) -> std::result::Result<Self, DispatchError> {
        Self::from_settings(CapabilitySettings::from_env(C::DOMAIN), sink)
    }

    pub fn domain(&self) -> &'static str {
        C::DOMAIN
    }

    /// Invoke and return the response only.
    pub async fn call(&self, request: C::Request) -> Result<C::Response> {
        self.invoke(request).await.map(InvocationResult::into_value)
    }

    /// Invoke and report which path served the call.
    pub async fn invoke(&self, request: C::Request) -> Result<InvocationResult<C::Response>> {
        let started = Instant::now();
        let operation = C::operation(&request);
        let handle = self.loader.acquire();
        handle.stats().record_call();

        let outcome = self.dispatch(&handle, operation, &request).await;
        let latency_ms = elapsed_ms(started);

        match &outcome {
            Ok(served) => {
                let (degraded, error_kind) = match served {
                    Served::Native(_) => (false, None),
                    Served::Fallback { reason, .. } => (true, Some(reason.kind)),
                };
                self.emit(
                    operation.name(),
                    served_backend(served),
                    degraded,
                    error_kind,
                    latency_ms,
                );
            }
            Err(e) => {
                let degraded = matches!(e, ProxyError::FallbackFailure { .. });
                self.emit(
                    operation.name(),
                    handle.backend(),
                    degraded,
                    Some(e.kind()),
                    latency_ms,
                );
            }
        }

        outcome.map(|served| InvocationResult { served, latency_ms })
    }

    /// Invoke by operation wire name with a JSON payload.
    pub async fn invoke_named(
        &self,
        operation: &str,
        payload: Value,
    ) -> Result<InvocationResult<C::Response>> {
        let started = Instant::now();

        let Some(op) =
            C::Operation::from_name(operation).filter(|op| self.table.route(*op).is_some())
        else {
            let handle = self.loader.acquire();
            self.emit(
                operation,
                handle.backend(),
                false,
                Some(ErrorKind::UnknownOperation),
                elapsed_ms(started),
            );
            return Err(ProxyError::UnknownOperation {
                domain: C::DOMAIN.to_string(),
                operation: operation.to_string(),
            });
        };

        let request = match JsonCodec::request_from_parts::<C>(op, payload) {
            Ok(request) => request,
            Err(e) => {
                let handle = self.loader.acquire();
                self.emit(
                    operation,
                    handle.backend(),
                    false,
                    Some(ErrorKind::InvalidRequest),
                    elapsed_ms(started),
                );
                return Err(ProxyError::InvalidRequest {
                    domain: C::DOMAIN.to_string(),
                    operation: operation.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        self.invoke(request).await
    }

    /// Like [`invoke_named`](Self::invoke_named) but returns the bare JSON
    /// response payload.
    pub async fn invoke_json(
        &self,
        operation: &str,
        payload: Value,
    ) -> Result<InvocationResult<Value>> {
        let result = self.invoke_named(operation, payload).await?;
        Ok(result.try_map(|response| JsonCodec::payload_of(&response))?)
    }

    /// Current backend. Triggers the load on first use.
    pub fn backend(&self) -> Backend {
        self.loader.acquire().backend()
    }

    pub fn version(&self) -> String {
        self.loader.acquire().version().to_string()
    }

    pub fn is_loaded(&self) -> bool {
        self.loader.acquire().loaded()
    }

    pub fn is_healthy(&self) -> bool {
        self.loader.acquire().is_healthy()
    }

    pub fn load_error(&self) -> Option<ErrorDetail> {
        self.loader.acquire().load_error().cloned()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.loader.acquire().stats().snapshot()
    }

    pub fn handle(&self) -> Arc<CapabilityHandle> {
        self.loader.acquire()
    }

    pub fn status(&self) -> CapabilityStatus {
        let handle = self.loader.acquire();
        CapabilityStatus {
            domain: C::DOMAIN.to_string(),
            backend: handle.backend(),
            loaded: handle.loaded(),
            version: handle.version().to_string(),
            healthy: handle.is_healthy(),
            loaded_at: handle.loaded_at(),
            load_error: handle.load_error().cloned(),
            stats: handle.stats().snapshot(),
        }
    }

    /// Every operation in declaration order.
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.table
            .routes()
            .map(|route| OperationInfo {
                name: route.operation.name().to_string(),
                native_method: route.native_method.to_string(),
                idempotence: route.operation.idempotence(),
            })
            .collect()
    }

    /// Number of load attempts so far; at most one until reset.
    pub fn load_attempts(&self) -> u64 {
        self.loader.load_attempts()
    }

    /// Drop the cached handle so the next call loads again.
    pub fn reset_for_tests(&mut self) {
        self.loader.reset();
    }

    async fn dispatch(
        &self,
        handle: &Arc<CapabilityHandle>,
        operation: C::Operation,
        request: &C::Request,
    ) -> Result<Served<C::Response>> {
        if let Err(reason) = request.validate() {
            return Err(ProxyError::InvalidRequest {
                domain: C::DOMAIN.to_string(),
                operation: operation.name().to_string(),
                reason,
            });
        }

        let route = self
            .table
            .route(operation)
            .ok_or_else(|| ProxyError::UnknownOperation {
                domain: C::DOMAIN.to_string(),
                operation: operation.name().to_string(),
            })?;

        let reason = if handle.module().is_some() {
            match self
                .call_native(handle, operation, route.native_method, request)
                .await
            {
                Ok(response) => {
                    handle.stats().record_native_success();
                    return Ok(Served::Native(response));
                }
                Err(e) => {
                    handle.stats().record_native_failure();
                    tracing::warn!(
                        domain = C::DOMAIN,
                        operation = operation.name(),
                        error = %e,
                        "Native call failed, serving fallback"
                    );
                    ErrorDetail::call_failure(&e)
                }
            }
        } else {
            handle.load_error().cloned().unwrap_or_else(|| {
                ErrorDetail::new(ErrorKind::LoadFailure, "native module unavailable", true)
            })
        };

        handle.stats().record_degraded();
        let value = panic::catch_unwind(AssertUnwindSafe(|| (route.fallback)(request)))
            .unwrap_or_else(|payload| {
                Err(FallbackError::Failed(format!(
                    "panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
            .and_then(|response| {
                response.validate().map_err(FallbackError::Failed)?;
                Ok(response)
            })
            .map_err(|source| {
                tracing::error!(
                    domain = C::DOMAIN,
                    operation = operation.name(),
                    error = %source,
                    "Fallback failed"
                );
                ProxyError::FallbackFailure {
                    domain: C::DOMAIN.to_string(),
                    operation: operation.name().to_string(),
                    source,
                }
            })?;

        Ok(Served::Fallback { value, reason })
    }

    async fn call_native(
        &self,
        handle: &Arc<CapabilityHandle>,
        operation: C::Operation,
        method: &'static str,
        request: &C::Request,
    ) -> std::result::Result<C::Response, CallError> {
        let payload = JsonCodec::encode_request::<C>(request).map_err(CallError::Encode)?;

        let task_handle = handle.clone();
        let task = tokio::task::spawn_blocking(move || {
            let module = task_handle
                .module()
                .ok_or_else(|| NativeError::MissingMethod(method.to_string()))?;
            let _guard = task_handle.invocation_lock().map(|lock| lock.lock());
            module.call(method, &payload)
        });

        let joined = match self.native_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    if operation.idempotence() == Idempotence::Effectful {
                        tracing::warn!(
                            domain = C::DOMAIN,
                            operation = operation.name(),
                            "Native call timed out; its effects may still be applied"
                        );
                    }
                    return Err(CallError::TimedOut(limit));
                }
            },
            None => task.await,
        };

        let raw = match joined {
            Ok(result) => result?,
            Err(e) if e.is_panic() => {
                return Err(CallError::Panicked(panic_message(e.into_panic().as_ref())))
            }
            Err(e) => return Err(CallError::Panicked(e.to_string())),
        };

        let response =
            JsonCodec::decode_response::<C>(operation, &raw).map_err(CallError::Decode)?;
        response.validate().map_err(CallError::InvalidResponse)?;
        Ok(response)
    }

    fn emit(
        &self,
        operation: &str,
        backend: Backend,
        degraded: bool,
        error_kind: Option<ErrorKind>,
        latency_ms: f64,
    ) {
        self.sink.emit(DiagnosticEvent::Invocation(InvocationRecord::new(
            C::DOMAIN,
            operation,
            backend,
            degraded,
            error_kind,
            latency_ms,
        )));
    }
}

impl<C: Capability> std::fmt::Debug for CapabilityFacade<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityFacade")
            .field("domain", &C::DOMAIN)
            .field("loader", &self.loader)
            .field("native_timeout", &self.native_timeout)
            .finish()
    }
}

fn served_backend<T>(served: &Served<T>) -> Backend {
    match served {
        Served::Native(_) => Backend::Native,
        Served::Fallback { .. } => Backend::Fallback,
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
