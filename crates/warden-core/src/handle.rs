//! Capability handle: the single record of whether acceleration is active.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ErrorDetail;
use crate::loader::NativeModule;

/// Consecutive native failures after which a native handle reports unhealthy.
pub const UNHEALTHY_FAILURE_THRESHOLD: u64 = 5;

/// Which implementation serves calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Native,
    Fallback,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Native => f.write_str("native"),
            Backend::Fallback => f.write_str("fallback"),
        }
    }
}

/// Call counters. The only state that changes after a load.
#[derive(Debug, Default)]
pub struct HandleStats {
    calls: AtomicU64,
    native_calls: AtomicU64,
    degraded_calls: AtomicU64,
    native_failures: AtomicU64,
    consecutive_native_failures: AtomicU64,
}

impl HandleStats {
    pub(crate) fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_native_success(&self) {
        self.native_calls.fetch_add(1, Ordering::Relaxed);
        self.consecutive_native_failures.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_native_failure(&self) {
        self.native_calls.fetch_add(1, Ordering::Relaxed);
        self.native_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_native_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degraded(&self) {
        self.degraded_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consecutive_native_failures(&self) -> u64 {
        self.consecutive_native_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            native_calls: self.native_calls.load(Ordering::Relaxed),
            degraded_calls: self.degraded_calls.load(Ordering::Relaxed),
            native_failures: self.native_failures.load(Ordering::Relaxed),
            consecutive_native_failures: self.consecutive_native_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HandleStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub calls: u64,
    pub native_calls: u64,
    pub degraded_calls: u64,
    pub native_failures: u64,
    pub consecutive_native_failures: u64,
}

/// Outcome of the one load attempt for a domain.
///
/// Immutable once created apart from its counters. Callers only ever see
/// it behind an `Arc`.
pub struct CapabilityHandle {
    domain: String,
    backend: Backend,
    version: String,
    load_error: Option<ErrorDetail>,
    module: Option<Arc<dyn NativeModule>>,
    invocation_lock: Option<Arc<Mutex<()>>>,
    stats: HandleStats,
    loaded_at: DateTime<Utc>,
}

impl CapabilityHandle {
    pub(crate) fn native(
        domain: &str,
        version: String,
        module: Arc<dyn NativeModule>,
        serialize_calls: bool,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            backend: Backend::Native,
            version,
            load_error: None,
            module: Some(module),
            invocation_lock: serialize_calls.then(|| Arc::new(Mutex::new(()))),
            stats: HandleStats::default(),
            loaded_at: Utc::now(),
        }
    }

    pub(crate) fn fallback(domain: &str, version: &str, load_error: ErrorDetail) -> Self {
        Self {
            domain: domain.to_string(),
            backend: Backend::Fallback,
            version: version.to_string(),
            load_error: Some(load_error),
            module: None,
            invocation_lock: None,
            stats: HandleStats::default(),
            loaded_at: Utc::now(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// True when the native module loaded and passed its self-check.
    pub fn loaded(&self) -> bool {
        self.backend == Backend::Native
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn load_error(&self) -> Option<&ErrorDetail> {
        self.load_error.as_ref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn stats(&self) -> &HandleStats {
        &self.stats
    }

    /// Whether calls are served reliably.
    ///
    /// The fallback path is always healthy. A native handle reports
    /// unhealthy after [`UNHEALTHY_FAILURE_THRESHOLD`] consecutive native
    /// failures and recovers on the next native success. This never
    /// changes the backend.
    pub fn is_healthy(&self) -> bool {
        match self.backend {
            Backend::Fallback => true,
            Backend::Native => {
                self.stats.consecutive_native_failures() < UNHEALTHY_FAILURE_THRESHOLD
            }
        }
    }

    pub(crate) fn module(&self) -> Option<&Arc<dyn NativeModule>> {
        self.module.as_ref()
    }

    pub(crate) fn invocation_lock(&self) -> Option<&Arc<Mutex<()>>> {
        self.invocation_lock.as_ref()
    }
}

impl std::fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("domain", &self.domain)
            .field("backend", &self.backend)
            .field("version", &self.version)
            .field("load_error", &self.load_error)
            .field("serialized", &self.invocation_lock.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LoadError};

    #[test]
    fn test_fallback_handle() {
        let handle = CapabilityHandle::fallback(
            "ioc",
            "1.0.0-fallback",
            ErrorDetail::load_failure(&LoadError::Disabled("no library configured".into())),
        );
        assert!(!handle.loaded());
        assert_eq!(handle.backend(), Backend::Fallback);
        assert_eq!(handle.version(), "1.0.0-fallback");
        assert_eq!(handle.load_error().unwrap().kind, ErrorKind::LoadFailure);
        assert!(handle.is_healthy());
        assert!(handle.module().is_none());
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = HandleStats::default();
        stats.record_call();
        stats.record_native_failure();
        stats.record_degraded();
        stats.record_call();
        stats.record_native_success();

        let snap = stats.snapshot();
        assert_eq!(snap.calls, 2);
        assert_eq!(snap.native_calls, 2);
        assert_eq!(snap.native_failures, 1);
        assert_eq!(snap.degraded_calls, 1);
        assert_eq!(snap.consecutive_native_failures, 0);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Native.to_string(), "native");
        assert_eq!(serde_json::to_string(&Backend::Fallback).unwrap(), "\"fallback\"");
    }
}
