//! Native capability libraries (.so/.dylib/.dll) loaded through `libloading`.

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use warden_extension_sdk::abi::{
    self, AbiVersionFn, FreeStringFn, InitializeFn, LastErrorFn, OperationFn, StaticStrFn,
    ABI_VERSION,
};

use super::{ModuleResolver, NativeModule};
use crate::error::{LoadError, NativeError};

/// Whether `path` has the shared-library extension of this platform.
pub fn is_native_library(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == std::env::consts::DLL_EXTENSION)
        .unwrap_or(false)
}

/// Resolves a domain's module from a shared library on disk.
#[derive(Debug, Clone)]
pub struct DylibResolver {
    path: PathBuf,
}

impl DylibResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleResolver for DylibResolver {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    fn resolve(
        &self,
        domain: &str,
        methods: &[&'static str],
    ) -> Result<Arc<dyn NativeModule>, LoadError> {
        let module = DylibModule::open(&self.path, domain, methods)?;
        Ok(Arc::new(module))
    }
}

/// A loaded capability library.
///
/// Every function pointer below points into `_library`, which is declared
/// last so it is dropped after them.
pub struct DylibModule {
    path: PathBuf,
    version: String,
    initialize_fn: InitializeFn,
    free_fn: FreeStringFn,
    last_error_fn: Option<LastErrorFn>,
    operations: HashMap<&'static str, OperationFn>,
    _library: Library,
}

impl DylibModule {
    /// Open `path` and bind the symbols for `domain` and `methods`.
    pub fn open(path: &Path, domain: &str, methods: &[&'static str]) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.display().to_string()));
        }
        if !is_native_library(path) {
            return Err(LoadError::InvalidFormat(format!(
                "{} is not a .{} library",
                path.display(),
                std::env::consts::DLL_EXTENSION
            )));
        }

        let library = unsafe {
            Library::new(path)
                .map_err(|e| LoadError::LoadFailed(format!("Failed to load library: {}", e)))?
        };

        let abi_version: AbiVersionFn = unsafe { symbol(&library, abi::SYMBOL_ABI_VERSION)? };
        let got = unsafe { abi_version() };
        if got != ABI_VERSION {
            return Err(LoadError::IncompatibleAbi {
                expected: ABI_VERSION,
                got,
            });
        }

        let domain_fn: StaticStrFn = unsafe { symbol(&library, abi::SYMBOL_DOMAIN)? };
        let provided = unsafe { static_str(domain_fn) }
            .ok_or_else(|| LoadError::LoadFailed("Library reports no domain".to_string()))?;
        if provided != domain {
            return Err(LoadError::DomainMismatch {
                expected: domain.to_string(),
                got: provided,
            });
        }

        let version_fn: StaticStrFn = unsafe { symbol(&library, abi::SYMBOL_VERSION)? };
        let version = unsafe { static_str(version_fn) }
            .ok_or_else(|| LoadError::InvalidVersion(String::new()))?;

        let initialize_fn: InitializeFn = unsafe { symbol(&library, abi::SYMBOL_INITIALIZE)? };
        let free_fn: FreeStringFn = unsafe { symbol(&library, abi::SYMBOL_FREE_STRING)? };
        // Optional: without it failed calls carry no message
        let last_error_fn: Option<LastErrorFn> =
            unsafe { symbol(&library, abi::SYMBOL_LAST_ERROR).ok() };

        let mut operations = HashMap::with_capacity(methods.len());
        for method in methods {
            let name = abi::operation_symbol(method);
            let op: OperationFn = unsafe { symbol(&library, &name)? };
            operations.insert(*method, op);
        }

        tracing::debug!(
            path = %path.display(),
            domain,
            version = %version,
            operations = operations.len(),
            "Native capability library opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            version,
            initialize_fn,
            free_fn,
            last_error_fn,
            operations,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take ownership of a library-allocated string and release it.
    fn take_string(&self, ptr: *mut c_char) -> Option<Result<String, std::str::Utf8Error>> {
        if ptr.is_null() {
            return None;
        }
        let value = unsafe { CStr::from_ptr(ptr) }.to_str().map(str::to_string);
        unsafe { (self.free_fn)(ptr) };
        Some(value)
    }

    fn last_error(&self) -> Option<String> {
        let f = self.last_error_fn?;
        let ptr = unsafe { f() };
        self.take_string(ptr).and_then(Result::ok)
    }
}

impl NativeModule for DylibModule {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn initialize(&self, config: &str) -> bool {
        let Ok(config) = CString::new(config) else {
            return false;
        };
        unsafe { (self.initialize_fn)(config.as_ptr()) }
    }

    fn call(&self, method: &str, payload: &str) -> Result<String, NativeError> {
        let op = self
            .operations
            .get(method)
            .copied()
            .ok_or_else(|| NativeError::MissingMethod(method.to_string()))?;
        let payload =
            CString::new(payload).map_err(|_| NativeError::InvalidPayload(method.to_string()))?;

        let result = unsafe { op(payload.as_ptr()) };
        match self.take_string(result) {
            Some(Ok(value)) => Ok(value),
            Some(Err(_)) => Err(NativeError::InvalidUtf8(method.to_string())),
            None => match self.last_error() {
                Some(message) => Err(NativeError::Failed {
                    method: method.to_string(),
                    message,
                }),
                None => Err(NativeError::NullResult(method.to_string())),
            },
        }
    }
}

impl std::fmt::Debug for DylibModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibModule")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("operations", &self.operations.len())
            .finish()
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, LoadError> {
    let sym: Symbol<T> = library
        .get(name.as_bytes())
        .map_err(|e| LoadError::SymbolNotFound(format!("{}: {}", name, e)))?;
    Ok(*sym)
}

unsafe fn static_str(f: StaticStrFn) -> Option<String> {
    let ptr = f();
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_string)
}
