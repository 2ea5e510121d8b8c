//! Process-wide entry point holding one facade per domain.

use std::sync::Arc;

use serde_json::Value;
use warden_core::{
    Backend, Capability, CapabilitySettings, CapabilityStatus, DiagnosticEvent, DiagnosticSink,
    DispatchError, ErrorKind, InvocationRecord, InvocationResult, OperationInfo, ProxyError,
    Result,
};

use crate::cve::{CveCapability, CveCore};
use crate::ioc::{IocCapability, IocCore};
use crate::ml::{MlCapability, MlCore};
use crate::sandbox::{SandboxCapability, SandboxCore};

/// Every domain the context serves, in status order.
pub const DOMAINS: [&str; 4] = [
    MlCapability::DOMAIN,
    CveCapability::DOMAIN,
    IocCapability::DOMAIN,
    SandboxCapability::DOMAIN,
];

/// Shared state handed to whatever sits in front of the capability layer.
///
/// Cheap to clone. Each domain still loads its native library lazily, on
/// its first call.
#[derive(Clone)]
pub struct CapabilityContext {
    ml: Arc<MlCore>,
    cve: Arc<CveCore>,
    ioc: Arc<IocCore>,
    sandbox: Arc<SandboxCore>,
    sink: Arc<dyn DiagnosticSink>,
}

impl CapabilityContext {
    /// Build every domain from the settings `settings_for` returns for it.
    pub fn from_settings<F>(
        settings_for: F,
        sink: Arc<dyn DiagnosticSink>,
    ) -> std::result::Result<Self, DispatchError>
    where
        F: Fn(&'static str) -> CapabilitySettings,
    {
        Ok(Self {
            ml: Arc::new(MlCore::from_settings(
                settings_for(MlCapability::DOMAIN),
                sink.clone(),
            )?),
            cve: Arc::new(CveCore::from_settings(
                settings_for(CveCapability::DOMAIN),
                sink.clone(),
            )?),
            ioc: Arc::new(IocCore::from_settings(
                settings_for(IocCapability::DOMAIN),
                sink.clone(),
            )?),
            sandbox: Arc::new(SandboxCore::from_settings(
                settings_for(SandboxCapability::DOMAIN),
                sink.clone(),
            )?),
            sink,
        })
    }

    /// Build every domain from `WARDEN_*` environment variables.
    pub fn from_env(sink: Arc<dyn DiagnosticSink>) -> std::result::Result<Self, DispatchError> {
        Self::from_settings(CapabilitySettings::from_env, sink)
    }

    pub fn ml(&self) -> &MlCore {
        &self.ml
    }

    pub fn cve(&self) -> &CveCore {
        &self.cve
    }

    pub fn ioc(&self) -> &IocCore {
        &self.ioc
    }

    pub fn sandbox(&self) -> &SandboxCore {
        &self.sandbox
    }

    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        self.sink.clone()
    }

    /// Status of every domain. Loads any domain not yet loaded.
    pub fn status(&self) -> Vec<CapabilityStatus> {
        vec![
            self.ml.status(),
            self.cve.status(),
            self.ioc.status(),
            self.sandbox.status(),
        ]
    }

    /// Operations of one domain, or `None` for an unknown domain.
    pub fn operations(&self, domain: &str) -> Option<Vec<OperationInfo>> {
        match domain {
            MlCapability::DOMAIN => Some(self.ml.operations()),
            CveCapability::DOMAIN => Some(self.cve.operations()),
            IocCapability::DOMAIN => Some(self.ioc.operations()),
            SandboxCapability::DOMAIN => Some(self.sandbox.operations()),
            _ => None,
        }
    }

    /// Route a JSON payload by domain and operation name.
    pub async fn invoke(
        &self,
        domain: &str,
        operation: &str,
        payload: Value,
    ) -> Result<InvocationResult<Value>> {
        match domain {
            MlCapability::DOMAIN => self.ml.invoke_json(operation, payload).await,
            CveCapability::DOMAIN => self.cve.invoke_json(operation, payload).await,
            IocCapability::DOMAIN => self.ioc.invoke_json(operation, payload).await,
            SandboxCapability::DOMAIN => self.sandbox.invoke_json(operation, payload).await,
            _ => {
                tracing::warn!(domain, operation, "Invocation for unknown domain");
                self.sink.emit(DiagnosticEvent::Invocation(InvocationRecord::new(
                    domain,
                    operation,
                    Backend::Fallback,
                    false,
                    Some(ErrorKind::UnknownOperation),
                    0.0,
                )));
                Err(ProxyError::UnknownOperation {
                    domain: domain.to_string(),
                    operation: operation.to_string(),
                })
            }
        }
    }

    /// Drop every cached handle so the next call loads again.
    ///
    /// Returns `false`, leaving shared domains untouched, when clones of
    /// this context are still alive.
    pub fn reset_for_tests(&mut self) -> bool {
        let mut all = true;
        match Arc::get_mut(&mut self.ml) {
            Some(core) => core.reset_for_tests(),
            None => all = false,
        }
        match Arc::get_mut(&mut self.cve) {
            Some(core) => core.reset_for_tests(),
            None => all = false,
        }
        match Arc::get_mut(&mut self.ioc) {
            Some(core) => core.reset_for_tests(),
            None => all = false,
        }
        match Arc::get_mut(&mut self.sandbox) {
            Some(core) => core.reset_for_tests(),
            None => all = false,
        }
        all
    }
}

impl std::fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("domains", &DOMAINS)
            .finish_non_exhaustive()
    }
}
