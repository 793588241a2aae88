use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, LitStr, Token};

struct ServiceRegistrationArgs {
    service_type: LitStr,
    host: LitStr,
    port: syn::LitInt,
}

impl Parse for ServiceRegistrationArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let service_type: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let host: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let port: syn::LitInt = input.parse()?;
        // allow a trailing comma
        let _ = input.parse::<Option<Token![,]>>()?;

        if service_type.value().trim().is_empty() {
            return Err(syn::Error::new(service_type.span(), "service type must not be empty"));
        }
        if host.value().trim().is_empty() {
            return Err(syn::Error::new(host.span(), "host must not be empty"));
        }
        match port.base10_parse::<u16>() {
            Ok(0) => return Err(syn::Error::new(port.span(), "port must be non-zero")),
            Ok(_) => {}
            Err(e) => return Err(syn::Error::new(port.span(), e)),
        }

        Ok(ServiceRegistrationArgs {
            service_type,
            host,
            port,
        })
    }
}

/// Macro to register the current process with the service registry and keep
/// it heartbeating.
///
/// Expands to a future resolving to
/// `Result<service_registry::ServiceHandle, service_registry::RegistryError>`.
/// Literals are checked at compile time.
///
/// # Example
/// ```ignore
/// use service_registry::register_service;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = register_service!("worker", "10.0.0.5", 9000).await.unwrap();
///     // ...
///     handle.shutdown().await.unwrap();
/// }
/// ```
#[proc_macro]
pub fn register_service(input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(input as ServiceRegistrationArgs);

    let service_type = args.service_type;
    let host = args.host;
    let port = args.port;

    let expanded = quote! {
        ::service_registry::bootstrap_service(#service_type, #host, #port)
    };

    TokenStream::from(expanded)
}
