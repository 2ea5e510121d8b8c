/// Declare a domain's typed facade wrapper.
///
/// The wrapper derefs to the underlying [`CapabilityFacade`] for
/// introspection and name-based calls, and adds one typed async method per
/// operation that unwraps the matching response variant.
///
/// [`CapabilityFacade`]: warden_core::CapabilityFacade
macro_rules! capability_core {
    (
        $(#[$meta:meta])*
        pub struct $core:ident for $cap:ty {
            request: $req:ident,
            response: $resp:ident,
            operations: {
                $( $(#[$op_meta:meta])* $method:ident => $variant:ident($input:ty) -> $output:ty; )*
            }
        }
    ) => {
        $(#[$meta])*
        pub struct $core {
            facade: ::warden_core::CapabilityFacade<$cap>,
        }

        impl $core {
            pub fn new(facade: ::warden_core::CapabilityFacade<$cap>) -> Self {
                Self { facade }
            }

            /// Build from settings; the resolver follows the configured library path.
            pub fn from_settings(
                settings: ::warden_core::CapabilitySettings,
                sink: ::std::sync::Arc<dyn ::warden_core::DiagnosticSink>,
            ) -> ::std::result::Result<Self, ::warden_core::DispatchError> {
                ::warden_core::CapabilityFacade::<$cap>::from_settings(settings, sink)
                    .map(Self::new)
            }

            pub fn into_inner(self) -> ::warden_core::CapabilityFacade<$cap> {
                self.facade
            }

            $(
                $(#[$op_meta])*
                pub async fn $method(
                    &self,
                    request: $input,
                ) -> ::warden_core::Result<::warden_core::InvocationResult<$output>> {
                    let request = $req::$variant(request);
                    let operation = <$cap as ::warden_core::Capability>::operation(&request);
                    let result = self.facade.invoke(request).await?;
                    result.try_map(|response| match response {
                        $resp::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        _ => Err(::warden_core::ProxyError::ResponseMismatch {
                            domain: <$cap as ::warden_core::Capability>::DOMAIN.to_string(),
                            operation: ::warden_core::OperationKind::name(&operation).to_string(),
                        }),
                    })
                }
            )*
        }

        impl ::std::ops::Deref for $core {
            type Target = ::warden_core::CapabilityFacade<$cap>;

            fn deref(&self) -> &Self::Target {
                &self.facade
            }
        }

        impl ::std::ops::DerefMut for $core {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.facade
            }
        }
    };
}
