//! Symbol names and function signatures shared by the host loader and
//! native capability libraries.

use std::ffi::c_char;

/// Capability ABI version.
/// Incremented when breaking changes are made to the exported symbols.
pub const ABI_VERSION: u32 = 1;

pub const SYMBOL_ABI_VERSION: &str = "warden_capability_abi_version";
pub const SYMBOL_DOMAIN: &str = "warden_capability_domain";
pub const SYMBOL_VERSION: &str = "warden_capability_version";
pub const SYMBOL_INITIALIZE: &str = "warden_capability_initialize";
pub const SYMBOL_LAST_ERROR: &str = "warden_capability_last_error";
pub const SYMBOL_FREE_STRING: &str = "warden_capability_free_string";

/// Prefix of every per-operation symbol.
pub const OPERATION_SYMBOL_PREFIX: &str = "warden_op_";

/// `warden_capability_abi_version`
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// `warden_capability_domain` and `warden_capability_version`.
/// The returned pointer is static and must not be freed.
pub type StaticStrFn = unsafe extern "C" fn() -> *const c_char;

/// `warden_capability_initialize`
pub type InitializeFn = unsafe extern "C" fn(config: *const c_char) -> bool;

/// `warden_op_<method>`. A null return signals a failed call.
pub type OperationFn = unsafe extern "C" fn(payload: *const c_char) -> *mut c_char;

/// `warden_capability_last_error`. May return null.
pub type LastErrorFn = unsafe extern "C" fn() -> *mut c_char;

/// `warden_capability_free_string`
pub type FreeStringFn = unsafe extern "C" fn(ptr: *mut c_char);

/// Symbol name for an operation's native method.
pub fn operation_symbol(method: &str) -> String {
    format!("{}{}", OPERATION_SYMBOL_PREFIX, method)
}

/// Method names become symbol suffixes, so they must be plain identifiers.
pub fn is_valid_method_name(method: &str) -> bool {
    let mut chars = method.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
