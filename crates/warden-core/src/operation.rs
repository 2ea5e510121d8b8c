//! Capability and operation traits.
//!
//! A capability domain declares a closed operation enum plus one request
//! enum and one response enum. Both enums are serde adjacently tagged with
//! `#[serde(tag = "operation", content = "payload")]` and use the operation
//! name as the variant name on the wire, which is what lets the codec move
//! a bare payload across the native boundary and re-attach its tag.

use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchTable;
use crate::error::DispatchError;

/// Whether an operation has effects beyond its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Idempotence {
    /// Same request, same outcome, no side effects
    Pure,
    /// May create or mutate state on the native side
    Effectful,
}

impl Idempotence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Idempotence::Pure => "pure",
            Idempotence::Effectful => "effectful",
        }
    }
}

/// Closed enumeration of a domain's operations.
pub trait OperationKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every operation, in declaration order.
    const ALL: &'static [Self];

    /// Wire name, e.g. `"predict"`.
    fn name(&self) -> &'static str;

    fn idempotence(&self) -> Idempotence;

    /// Look up an operation by wire name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

/// Basic shape validation applied to requests before dispatch and to
/// native responses before they are accepted.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// A pluggable unit of domain logic.
pub trait Capability: Sized + Send + Sync + 'static {
    /// Domain name; also the name a native library must report.
    const DOMAIN: &'static str;

    /// Version reported while the fallback path is serving.
    const FALLBACK_VERSION: &'static str;

    type Operation: OperationKind;
    type Request: Serialize + DeserializeOwned + Validate + Debug + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + Validate + Debug + Send + 'static;

    /// The operation a request targets.
    fn operation(request: &Self::Request) -> Self::Operation;

    /// Build the domain's dispatch table.
    fn dispatch_table() -> Result<DispatchTable<Self>, DispatchError>;
}

/// Check that a probability-like value lies in `[0, 1]`.
pub fn check_unit_interval(field: &str, value: f64) -> Result<(), String> {
    check_range(field, value, 0.0, 1.0)
}

/// Check that a finite value lies in `[min, max]`.
pub fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} is not finite", field));
    }
    if value < min || value > max {
        return Err(format!("{} = {} outside [{}, {}]", field, value, min, max));
    }
    Ok(())
}

/// Check that a string field is not blank.
pub fn check_not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_unit_interval("confidence", 0.0).is_ok());
        assert!(check_unit_interval("confidence", 1.0).is_ok());
        assert!(check_unit_interval("confidence", 1.01).is_err());
        assert!(check_unit_interval("confidence", f64::NAN).is_err());
        assert!(check_range("score", 7.5, 0.0, 10.0).is_ok());
        assert!(check_range("score", -0.1, 0.0, 10.0).is_err());
    }

    #[test]
    fn test_check_not_blank() {
        assert!(check_not_blank("modelId", "m1").is_ok());
        assert!(check_not_blank("modelId", "   ").is_err());
    }

    #[test]
    fn test_idempotence_serde() {
        assert_eq!(serde_json::to_string(&Idempotence::Effectful).unwrap(), "\"effectful\"");
        assert_eq!(Idempotence::Pure.as_str(), "pure");
    }
}
