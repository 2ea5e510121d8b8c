//! Call router: the closed mapping from operation to native method and
//! fallback function.
//!
//! Tables are built once, when a facade is constructed. A table that leaves
//! any operation unbound is rejected so a packaging defect can never hide
//! behind a silent fallback.

use std::collections::{HashMap, HashSet};

use warden_extension_sdk::abi::is_valid_method_name;

use crate::error::{DispatchError, FallbackError};
use crate::operation::{Capability, OperationKind};

/// Fallback function bound to one operation.
pub type FallbackFn<C> = fn(
    &<C as Capability>::Request,
) -> Result<<C as Capability>::Response, FallbackError>;

/// One row of the dispatch table.
pub struct Route<C: Capability> {
    pub operation: C::Operation,
    /// Native method name; the library exports it as `warden_op_<method>`.
    pub native_method: &'static str,
    pub fallback: FallbackFn<C>,
}

impl<C: Capability> Clone for Route<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Capability> Copy for Route<C> {}

impl<C: Capability> std::fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("operation", &self.operation.name())
            .field("native_method", &self.native_method)
            .finish()
    }
}

/// Validated dispatch table for a capability.
pub struct DispatchTable<C: Capability> {
    routes: Vec<Route<C>>,
    index: HashMap<C::Operation, usize>,
}

impl<C: Capability> std::fmt::Debug for DispatchTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("routes", &self.routes)
            .finish()
    }
}

impl<C: Capability> DispatchTable<C> {
    pub fn builder() -> DispatchTableBuilder<C> {
        DispatchTableBuilder { routes: Vec::new() }
    }

    /// Route for an operation.
    pub fn route(&self, operation: C::Operation) -> Option<&Route<C>> {
        self.index.get(&operation).map(|&i| &self.routes[i])
    }

    /// Route for an operation wire name.
    pub fn resolve(&self, name: &str) -> Option<&Route<C>> {
        C::Operation::from_name(name).and_then(|op| self.route(op))
    }

    /// Native method names, in operation declaration order.
    pub fn native_methods(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.native_method).collect()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<C>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Builder that enforces the table invariants in [`build`](Self::build).
pub struct DispatchTableBuilder<C: Capability> {
    routes: Vec<Route<C>>,
}

impl<C: Capability> DispatchTableBuilder<C> {
    /// Bind an operation to its native method and fallback.
    pub fn route(
        mut self,
        operation: C::Operation,
        native_method: &'static str,
        fallback: FallbackFn<C>,
    ) -> Self {
        self.routes.push(Route {
            operation,
            native_method,
            fallback,
        });
        self
    }

    /// Validate and freeze the table.
    ///
    /// Fails if an operation is bound twice, a method name is not a valid
    /// symbol suffix or is shared by two operations, or any operation in
    /// `C::Operation::ALL` is left unbound.
    pub fn build(self) -> Result<DispatchTable<C>, DispatchError> {
        let mut index = HashMap::with_capacity(self.routes.len());
        let mut methods = HashSet::with_capacity(self.routes.len());

        for (i, route) in self.routes.iter().enumerate() {
            if index.insert(route.operation, i).is_some() {
                return Err(DispatchError::Duplicate {
                    domain: C::DOMAIN.to_string(),
                    operation: route.operation.name().to_string(),
                });
            }
            if !is_valid_method_name(route.native_method) {
                return Err(DispatchError::InvalidMethod {
                    domain: C::DOMAIN.to_string(),
                    method: route.native_method.to_string(),
                });
            }
            if !methods.insert(route.native_method) {
                return Err(DispatchError::DuplicateMethod {
                    domain: C::DOMAIN.to_string(),
                    method: route.native_method.to_string(),
                });
            }
        }

        if let Some(missing) = C::Operation::ALL.iter().find(|op| !index.contains_key(*op)) {
            return Err(DispatchError::Unbound {
                domain: C::DOMAIN.to_string(),
                operation: missing.name().to_string(),
            });
        }

        // Keep declaration order regardless of bind order
        let mut routes = self.routes;
        routes.sort_by_key(|r| {
            C::Operation::ALL
                .iter()
                .position(|op| *op == r.operation)
                .unwrap_or(usize::MAX)
        });
        let index = routes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.operation, i))
            .collect();

        Ok(DispatchTable { routes, index })
    }
}

/// Adapt a typed fallback `fn(&Inner) -> Result<InnerResponse, FallbackError>`
/// into a [`FallbackFn`] for the request enum variant of the same name.
///
/// ```rust,ignore
/// DispatchTable::<MlCapability>::builder()
///     .route(
///         MlOperation::Predict,
///         "predict",
///         bind_fallback!(MlRequest, MlResponse, Predict, fallback::predict),
///     )
/// ```
#[macro_export]
macro_rules! bind_fallback {
    ($req:ident, $resp:ident, $variant:ident, $handler:path) => {
        |request: &$req| -> ::std::result::Result<$resp, $crate::FallbackError> {
            #[allow(unreachable_patterns)]
            match request {
                $req::$variant(inner) => $handler(inner).map($resp::$variant),
                _ => Err($crate::FallbackError::Mismatch {
                    expected: stringify!($variant),
                }),
            }
        }
    };
}
