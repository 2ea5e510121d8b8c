//! Capability domains served through the Warden proxy layer.
//!
//! Each domain pairs a typed core ([`MlCore`], [`CveCore`], [`IocCore`],
//! [`SandboxCore`]) with a deterministic fallback that answers whenever the
//! native library for that domain is missing or fails. [`CapabilityContext`]
//! bundles all four behind one shared diagnostic sink.

#[macro_use]
mod macros;

pub mod context;
pub mod cve;
pub mod ioc;
pub mod ml;
pub mod sandbox;
pub mod seed;

pub use context::{CapabilityContext, DOMAINS};
pub use cve::{CveCapability, CveCore, CveOperation};
pub use ioc::{IocCapability, IocCore, IocOperation};
pub use ml::{MlCapability, MlCore, MlOperation};
pub use sandbox::{SandboxCapability, SandboxCore, SandboxOperation};
pub use seed::{RequestSeed, FALLBACK_ID_PREFIX};
