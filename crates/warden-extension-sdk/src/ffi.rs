//! FFI plumbing used by [`export_capability!`](crate::export_capability).
//!
//! Strings crossing the boundary are NUL-terminated UTF-8. Strings returned
//! to the host are allocated here and must be released through
//! `warden_capability_free_string`.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CapabilityError, CapabilityResult};

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the error for the current thread's most recent failed call.
pub fn set_last_error(message: impl Into<String>) {
    let message = message.into();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Take the current thread's last error, clearing it.
pub fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

/// Borrow a C string passed in by the host.
///
/// Returns `None` for null pointers and invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn read_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller guarantees a valid NUL-terminated string
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Hand an owned string to the host. Returns null if `value` contains NUL.
pub fn into_raw_string(value: String) -> *mut c_char {
    match CString::new(value) {
        Ok(s) => s.into_raw(),
        Err(_) => {
            set_last_error("result contains an interior NUL byte");
            ptr::null_mut()
        }
    }
}

/// Release a string produced by [`into_raw_string`].
///
/// # Safety
/// `ptr` must be null or come from [`into_raw_string`] and not be freed twice.
pub unsafe fn free_raw_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: ptr was created by CString::into_raw
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Run an operation handler behind the C ABI.
///
/// Null or non-UTF-8 payloads, handler errors and handler panics all produce
/// a null return with the reason stored for `warden_capability_last_error`.
/// Any error left over from an earlier call is cleared on entry.
///
/// # Safety
/// `payload` must satisfy the contract of [`read_c_str`].
pub unsafe fn dispatch_operation(
    payload: *const c_char,
    handler: fn(&str) -> CapabilityResult<String>,
) -> *mut c_char {
    take_last_error();
    let Some(input) = (unsafe { read_c_str(payload) }) else {
        set_last_error("payload is null or not valid UTF-8");
        return ptr::null_mut();
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler(input))) {
        Ok(Ok(output)) => into_raw_string(output),
        Ok(Err(e)) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
        Err(payload) => {
            set_last_error(CapabilityError::Panicked(panic_message(payload.as_ref())).to_string());
            ptr::null_mut()
        }
    }
}

/// Run the initialize self-check behind the C ABI. A null config is passed
/// to the handler as an empty string; a panic counts as a failed check.
///
/// # Safety
/// `config` must satisfy the contract of [`read_c_str`].
pub unsafe fn dispatch_initialize(config: *const c_char, init: fn(&str) -> bool) -> bool {
    take_last_error();
    let input = if config.is_null() {
        ""
    } else {
        match unsafe { read_c_str(config) } {
            Some(s) => s,
            None => {
                set_last_error("config is not valid UTF-8");
                return false;
            }
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| init(input))) {
        Ok(ok) => ok,
        Err(payload) => {
            set_last_error(CapabilityError::Panicked(panic_message(payload.as_ref())).to_string());
            false
        }
    }
}

/// Take the last error as a host-owned string, or null when there is none.
pub fn last_error_raw() -> *mut c_char {
    match take_last_error() {
        Some(message) => into_raw_string(message),
        None => ptr::null_mut(),
    }
}

/// Deserialize a JSON payload, run `f`, serialize its response.
pub fn handle_json<Req, Resp, F>(payload: &str, f: F) -> CapabilityResult<String>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Req) -> CapabilityResult<Resp>,
{
    let request: Req = serde_json::from_str(payload)
        .map_err(|e| CapabilityError::InvalidInput(e.to_string()))?;
    let response = f(request)?;
    Ok(serde_json::to_string(&response)?)
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(payload: &str) -> CapabilityResult<String> {
        Ok(payload.to_uppercase())
    }

    fn reject(_payload: &str) -> CapabilityResult<String> {
        Err(CapabilityError::Failed("model not trained".into()))
    }

    fn explode(_payload: &str) -> CapabilityResult<String> {
        panic!("boom");
    }

    unsafe fn take(ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { free_raw_string(ptr) };
        Some(s)
    }

    #[test]
    fn test_dispatch_success() {
        let input = CString::new("abc").unwrap();
        let out = unsafe { take(dispatch_operation(input.as_ptr(), echo)) };
        assert_eq!(out.as_deref(), Some("ABC"));
    }

    #[test]
    fn test_dispatch_error_sets_last_error() {
        let input = CString::new("{}").unwrap();
        let out = unsafe { dispatch_operation(input.as_ptr(), reject) };
        assert!(out.is_null());
        let err = unsafe { take(last_error_raw()) }.unwrap();
        assert!(err.contains("model not trained"));
        // Taking the error clears it
        assert!(last_error_raw().is_null());
    }

    #[test]
    fn test_success_clears_stale_error() {
        let input = CString::new("{}").unwrap();
        assert!(unsafe { dispatch_operation(input.as_ptr(), reject) }.is_null());

        let out = unsafe { take(dispatch_operation(input.as_ptr(), echo)) };
        assert_eq!(out.as_deref(), Some("{}"));
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_dispatch_contains_panic() {
        let input = CString::new("{}").unwrap();
        let out = unsafe { dispatch_operation(input.as_ptr(), explode) };
        assert!(out.is_null());
        assert!(take_last_error().unwrap().contains("boom"));
    }

    #[test]
    fn test_dispatch_null_payload() {
        let out = unsafe { dispatch_operation(ptr::null(), echo) };
        assert!(out.is_null());
        assert!(take_last_error().is_some());
    }

    #[test]
    fn test_initialize_null_config_is_empty() {
        fn accept_empty(config: &str) -> bool {
            config.is_empty()
        }
        assert!(unsafe { dispatch_initialize(ptr::null(), accept_empty) });
    }

    #[test]
    fn test_handle_json() {
        #[derive(serde::Deserialize)]
        struct Req {
            value: i64,
        }
        #[derive(serde::Serialize)]
        struct Resp {
            doubled: i64,
        }

        let out =
            handle_json(r#"{"value": 21}"#, |r: Req| Ok(Resp { doubled: r.value * 2 })).unwrap();
        assert_eq!(out, r#"{"doubled":42}"#);

        let err =
            handle_json(r#"{"other": 1}"#, |r: Req| Ok(Resp { doubled: r.value })).unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput(_)));
    }
}
