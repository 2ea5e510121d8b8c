//! Diagnostic events and sinks.
//!
//! Every invocation emits exactly one [`InvocationRecord`]; every load
//! attempt emits exactly one [`LoadEvent`]. Sinks are synchronous and must
//! not block: they run on the caller's task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{ErrorDetail, ErrorKind};
use crate::handle::Backend;

/// Default channel capacity for [`BroadcastSink`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// One record per facade invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub operation: String,
    pub backend: Backend,
    pub degraded: bool,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl InvocationRecord {
    /// A record stamped with a fresh id and the current time.
    pub fn new(
        domain: impl Into<String>,
        operation: impl Into<String>,
        backend: Backend,
        degraded: bool,
        error_kind: Option<ErrorKind>,
        latency_ms: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            domain: domain.into(),
            operation: operation.into(),
            backend,
            degraded,
            latency_ms,
            error_kind,
        }
    }
}

/// Outcome of a capability load attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadEvent {
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub backend: Backend,
    pub version: String,
    /// Where the loader looked, e.g. a library path
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    Load(LoadEvent),
    Invocation(InvocationRecord),
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::Load(e) => match &e.reason {
                None => tracing::info!(
                    domain = %e.domain,
                    backend = %e.backend,
                    version = %e.version,
                    source = %e.source,
                    "Capability backend selected"
                ),
                Some(reason) => tracing::warn!(
                    domain = %e.domain,
                    backend = %e.backend,
                    version = %e.version,
                    source = %e.source,
                    reason = %reason.message,
                    "Capability backend selected"
                ),
            },
            DiagnosticEvent::Invocation(r) => tracing::debug!(
                domain = %r.domain,
                operation = %r.operation,
                backend = %r.backend,
                degraded = r.degraded,
                latency_ms = r.latency_ms,
                error_kind = ?r.error_kind,
                "Capability invocation"
            ),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    pub fn invocations(&self) -> Vec<InvocationRecord> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::Invocation(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<LoadEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DiagnosticEvent::Load(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().push(event);
    }
}

/// Publishes events on a broadcast channel.
///
/// Events published with no subscribers are dropped, and slow
/// subscribers lose the oldest events once the buffer is full.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DiagnosticEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for BroadcastSink {
    fn emit(&self, event: DiagnosticEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}

/// Forwards every event to each inner sink.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl DiagnosticSink for FanoutSink {
    fn emit(&self, event: DiagnosticEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
