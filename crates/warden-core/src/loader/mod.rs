//! Extension loader.
//!
//! The loader makes exactly one attempt per domain to resolve and activate
//! the native module and caches the outcome in a [`CapabilityHandle`].
//! Every failure on the way, including a panic, lands in the handle as a
//! load error and selects the fallback backend.
//!
//! ```text
//! settings ──► init config ──► resolver ──► version check ──► initialize
//!                  │               │              │                │
//!                  └───────────────┴──────┬───────┴────────────────┘
//!                                         ▼
//!                              CapabilityHandle (Native | Fallback)
//! ```

pub mod native;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::OnceCell;

use crate::config::CapabilitySettings;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, LoadEvent};
use crate::error::{ErrorDetail, LoadError, NativeError};
use crate::handle::CapabilityHandle;

pub use native::{is_native_library, DylibModule, DylibResolver};

/// A resolved native capability.
///
/// Each method takes and returns one serialized string. Implementations
/// must be callable from any thread; a module that is not reentrant should
/// be configured with serialized calls.
pub trait NativeModule: Send + Sync {
    /// Semver version of the native implementation.
    fn version(&self) -> String;

    /// Self-check with the serialized init config. `false` refuses activation.
    fn initialize(&self, config: &str) -> bool;

    /// Invoke one native method.
    fn call(&self, method: &str, payload: &str) -> Result<String, NativeError>;
}

/// Produces the native module for a domain.
pub trait ModuleResolver: Send + Sync {
    /// Where the module comes from, for diagnostics.
    fn source(&self) -> String;

    /// Resolve a module that provides every method in `methods`.
    fn resolve(
        &self,
        domain: &str,
        methods: &[&'static str],
    ) -> Result<Arc<dyn NativeModule>, LoadError>;
}

/// Resolver for a module that is already in process, such as a statically
/// linked implementation.
pub struct StaticResolver {
    module: Arc<dyn NativeModule>,
    label: String,
}

impl StaticResolver {
    pub fn new(module: Arc<dyn NativeModule>) -> Self {
        Self {
            module,
            label: "static".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl ModuleResolver for StaticResolver {
    fn source(&self) -> String {
        self.label.clone()
    }

    fn resolve(
        &self,
        _domain: &str,
        _methods: &[&'static str],
    ) -> Result<Arc<dyn NativeModule>, LoadError> {
        Ok(self.module.clone())
    }
}

/// Resolver that never produces a module.
pub struct UnavailableResolver {
    reason: String,
}

impl UnavailableResolver {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ModuleResolver for UnavailableResolver {
    fn source(&self) -> String {
        "none".to_string()
    }

    fn resolve(
        &self,
        _domain: &str,
        _methods: &[&'static str],
    ) -> Result<Arc<dyn NativeModule>, LoadError> {
        Err(LoadError::Disabled(self.reason.clone()))
    }
}

/// Pick the resolver described by `settings`.
pub fn resolver_for(settings: &CapabilitySettings) -> Arc<dyn ModuleResolver> {
    match &settings.library_path {
        Some(path) => Arc::new(DylibResolver::new(path)),
        None => Arc::new(UnavailableResolver::new("no native library configured")),
    }
}

/// Single-resolution loader for one capability domain.
pub struct CapabilityLoader {
    domain: &'static str,
    fallback_version: &'static str,
    methods: Vec<&'static str>,
    settings: CapabilitySettings,
    resolver: Arc<dyn ModuleResolver>,
    sink: Arc<dyn DiagnosticSink>,
    handle: OnceCell<Arc<CapabilityHandle>>,
    attempts: AtomicU64,
}

impl CapabilityLoader {
    pub fn new(
        domain: &'static str,
        fallback_version: &'static str,
        methods: Vec<&'static str>,
        settings: CapabilitySettings,
        resolver: Arc<dyn ModuleResolver>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            domain,
            fallback_version,
            methods,
            settings,
            resolver,
            sink,
            handle: OnceCell::new(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the handle, loading on first use.
    ///
    /// Concurrent first calls block until the single load attempt finishes
    /// and then all observe the same handle.
    pub fn acquire(&self) -> Arc<CapabilityHandle> {
        self.handle.get_or_init(|| Arc::new(self.load())).clone()
    }

    /// Whether a load outcome has been recorded.
    pub fn is_acquired(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Number of load attempts made so far.
    pub fn load_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn settings(&self) -> &CapabilitySettings {
        &self.settings
    }

    /// Forget the recorded outcome so the next `acquire` loads again.
    ///
    /// Test hook. Requires exclusive access, so no call can be in flight.
    pub fn reset(&mut self) {
        self.handle.take();
        self.attempts.store(0, Ordering::Relaxed);
    }

    fn load(&self) -> CapabilityHandle {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let source = self.resolver.source();
        tracing::debug!(domain = self.domain, source = %source, "Resolving native capability");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.activate()))
            .unwrap_or_else(|payload| {
                let message = warden_extension_sdk::ffi::panic_message(payload.as_ref());
                tracing::error!(
                    domain = self.domain,
                    panic = %message,
                    "Native capability load panicked"
                );
                Err(LoadError::Panicked(message))
            });

        let handle = match outcome {
            Ok((version, module)) => CapabilityHandle::native(
                self.domain,
                version,
                module,
                self.settings.serialize_native_calls,
            ),
            Err(e) => {
                tracing::warn!(
                    domain = self.domain,
                    source = %source,
                    error = %e,
                    "Native capability unavailable, using fallback"
                );
                CapabilityHandle::fallback(
                    self.domain,
                    self.fallback_version,
                    ErrorDetail::load_failure(&e),
                )
            }
        };

        self.sink.emit(DiagnosticEvent::Load(LoadEvent {
            timestamp: Utc::now(),
            domain: self.domain.to_string(),
            backend: handle.backend(),
            version: handle.version().to_string(),
            source,
            reason: handle.load_error().cloned(),
        }));

        handle
    }

    fn activate(&self) -> Result<(String, Arc<dyn NativeModule>), LoadError> {
        // A bad config must not reach the library at all
        let config = self.settings.init_config_string()?;

        let module = self.resolver.resolve(self.domain, &self.methods)?;

        let version = module.version().trim().to_string();
        semver::Version::parse(&version).map_err(|_| LoadError::InvalidVersion(version.clone()))?;

        if !module.initialize(&config) {
            return Err(LoadError::SelfCheckFailed(format!(
                "initialize returned false for {} {}",
                self.domain, version
            )));
        }

        Ok((version, module))
    }
}

impl std::fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityLoader")
            .field("domain", &self.domain)
            .field("source", &self.resolver.source())
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::handle::Backend;

    struct FixedModule {
        version: &'static str,
        accept: bool,
    }

    impl NativeModule for FixedModule {
        fn version(&self) -> String {
            self.version.to_string()
        }

        fn initialize(&self, _config: &str) -> bool {
            self.accept
        }

        fn call(&self, method: &str, _payload: &str) -> Result<String, NativeError> {
            Err(NativeError::MissingMethod(method.to_string()))
        }
    }

    struct PanickingResolver;

    impl ModuleResolver for PanickingResolver {
        fn source(&self) -> String {
            "panicking".into()
        }

        fn resolve(
            &self,
            _domain: &str,
            _methods: &[&'static str],
        ) -> Result<Arc<dyn NativeModule>, LoadError> {
            panic!("corrupt build");
        }
    }

    fn loader_with(resolver: Arc<dyn ModuleResolver>, sink: Arc<MemorySink>) -> CapabilityLoader {
        CapabilityLoader::new(
            "ml",
            "1.0.0-fallback",
            vec!["predict"],
            CapabilitySettings::new("ml"),
            resolver,
            sink,
        )
    }

    #[test]
    fn test_static_module_loads_native() {
        let sink = Arc::new(MemorySink::new());
        let module = Arc::new(FixedModule {
            version: "2.1.0",
            accept: true,
        });
        let loader = loader_with(Arc::new(StaticResolver::new(module)), sink.clone());

        let handle = loader.acquire();
        assert!(handle.loaded());
        assert_eq!(handle.version(), "2.1.0");
        assert!(handle.load_error().is_none());

        let loads = sink.loads();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].backend, Backend::Native);
    }

    #[test]
    fn test_acquire_is_idempotent() {
        let sink = Arc::new(MemorySink::new());
        let loader = loader_with(Arc::new(UnavailableResolver::new("off")), sink.clone());

        let a = loader.acquire();
        let b = loader.acquire();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.load_attempts(), 1);
        assert_eq!(sink.loads().len(), 1);
    }

    #[test]
    fn test_negative_self_check_falls_back() {
        let sink = Arc::new(MemorySink::new());
        let module = Arc::new(FixedModule {
            version: "2.1.0",
            accept: false,
        });
        let loader = loader_with(Arc::new(StaticResolver::new(module)), sink);

        let handle = loader.acquire();
        assert_eq!(handle.backend(), Backend::Fallback);
        assert_eq!(handle.version(), "1.0.0-fallback");
        assert!(handle.load_error().unwrap().message.contains("self-check"));
    }

    #[test]
    fn test_bad_version_falls_back() {
        let module = Arc::new(FixedModule {
            version: "banana",
            accept: true,
        });
        let loader = loader_with(
            Arc::new(StaticResolver::new(module)),
            Arc::new(MemorySink::new()),
        );
        let handle = loader.acquire();
        assert!(!handle.loaded());
        assert!(handle.load_error().unwrap().message.contains("banana"));
    }

    #[test]
    fn test_panicking_resolver_is_contained() {
        let loader = loader_with(Arc::new(PanickingResolver), Arc::new(MemorySink::new()));
        let handle = loader.acquire();
        assert!(!handle.loaded());
        assert!(handle.load_error().unwrap().message.contains("corrupt build"));
    }

    #[test]
    fn test_reset_allows_reload() {
        let mut loader = loader_with(
            Arc::new(UnavailableResolver::new("off")),
            Arc::new(MemorySink::new()),
        );
        loader.acquire();
        assert!(loader.is_acquired());
        loader.reset();
        assert!(!loader.is_acquired());
        loader.acquire();
        assert_eq!(loader.load_attempts(), 1);
    }

    #[test]
    fn test_resolver_for_settings() {
        let off = resolver_for(&CapabilitySettings::new("cve"));
        assert_eq!(off.source(), "none");
        let on = resolver_for(&CapabilitySettings::new("cve").with_library_path("/opt/libcve.so"));
        assert_eq!(on.source(), "/opt/libcve.so");
    }
}
