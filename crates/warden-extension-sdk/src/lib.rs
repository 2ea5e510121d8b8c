//! Warden Extension SDK
//!
//! This SDK provides the ABI definitions and export macro for building
//! native capability libraries that the Warden proxy layer can load.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use warden_extension_sdk::prelude::*;
//!
//! fn init(config: &str) -> bool {
//!     !config.is_empty()
//! }
//!
//! fn predict(payload: &str) -> CapabilityResult<String> {
//!     handle_json(payload, |req: serde_json::Value| Ok(req))
//! }
//!
//! export_capability! {
//!     domain: "ml",
//!     version: "1.0.0",
//!     initialize: init,
//!     operations: {
//!         predict => predict,
//!     }
//! }
//! ```
//!
//! # ABI
//!
//! A capability library exports:
//! - `warden_capability_abi_version()` -> u32 (must equal [`ABI_VERSION`])
//! - `warden_capability_domain()` -> *const c_char
//! - `warden_capability_version()` -> *const c_char
//! - `warden_capability_initialize(*const c_char)` -> bool
//! - `warden_capability_last_error()` -> *mut c_char
//! - `warden_capability_free_string(*mut c_char)`
//! - `warden_op_<method>(*const c_char)` -> *mut c_char, one per operation

pub mod abi;
pub mod error;
pub mod ffi;
#[macro_use]
pub mod macros;

pub use abi::{operation_symbol, ABI_VERSION, OPERATION_SYMBOL_PREFIX};
pub use error::{CapabilityError, CapabilityResult};
pub use ffi::handle_json;

/// Prelude module with common imports
pub mod prelude {
    pub use crate::abi::{operation_symbol, ABI_VERSION};
    pub use crate::error::{CapabilityError, CapabilityResult};
    pub use crate::ffi::handle_json;
    pub use crate::export_capability;
    pub use serde_json::Value;
}
