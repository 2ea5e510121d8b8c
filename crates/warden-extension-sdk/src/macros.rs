//! Declarative macros for capability library authors.

/// Export a native capability library.
///
/// Generates every symbol of the capability ABI. Each operation entry maps
/// the native method name (which becomes the `warden_op_<method>` symbol) to
/// a handler `fn(&str) -> CapabilityResult<String>` defined in the invoking
/// module.
///
/// # Example
///
/// ```rust,ignore
/// use warden_extension_sdk::prelude::*;
///
/// fn init(_config: &str) -> bool { true }
/// fn predict(payload: &str) -> CapabilityResult<String> { Ok(payload.to_string()) }
///
/// export_capability! {
///     domain: "ml",
///     version: "1.0.0",
///     initialize: init,
///     operations: {
///         predict => predict,
///     }
/// }
/// ```
#[macro_export]
macro_rules! export_capability {
    (
        domain: $domain:literal,
        version: $version:literal,
        initialize: $init:path,
        operations: {
            $( $method:ident => $handler:ident ),* $(,)?
        }
    ) => {
        #[no_mangle]
        pub extern "C" fn warden_capability_abi_version() -> u32 {
            $crate::abi::ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn warden_capability_domain() -> *const ::std::ffi::c_char {
            concat!($domain, "\0").as_ptr() as *const ::std::ffi::c_char
        }

        #[no_mangle]
        pub extern "C" fn warden_capability_version() -> *const ::std::ffi::c_char {
            concat!($version, "\0").as_ptr() as *const ::std::ffi::c_char
        }

        /// # Safety
        /// `config` must be null or a valid NUL-terminated string.
        #[no_mangle]
        pub unsafe extern "C" fn warden_capability_initialize(
            config: *const ::std::ffi::c_char,
        ) -> bool {
            unsafe { $crate::ffi::dispatch_initialize(config, $init) }
        }

        #[no_mangle]
        pub extern "C" fn warden_capability_last_error() -> *mut ::std::ffi::c_char {
            $crate::ffi::last_error_raw()
        }

        /// # Safety
        /// `ptr` must be null or a string returned by this library.
        #[no_mangle]
        pub unsafe extern "C" fn warden_capability_free_string(ptr: *mut ::std::ffi::c_char) {
            unsafe { $crate::ffi::free_raw_string(ptr) }
        }

        $(
            #[allow(non_snake_case)]
            pub mod $method {
                /// # Safety
                /// `payload` must be null or a valid NUL-terminated string.
                #[export_name = concat!("warden_op_", stringify!($method))]
                pub unsafe extern "C" fn call(
                    payload: *const ::std::ffi::c_char,
                ) -> *mut ::std::ffi::c_char {
                    unsafe { $crate::ffi::dispatch_operation(payload, super::$handler) }
                }
            }
        )*

        /// Native method names exported by this library.
        pub const WARDEN_EXPORTED_METHODS: &[&str] = &[$(stringify!($method)),*];
    };
}
