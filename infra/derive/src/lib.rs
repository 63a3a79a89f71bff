#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the node infrastructure and feature crates.
//! They remove the boilerplate around domain error enums, the specialized
//! async runtime entrypoint, and feature-slice handles.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Attribute macro to bootstrap the specialized Tokio runtime.
///
/// This macro transforms an `async fn main` into a standard `fn main` that
/// initializes a pre-configured Tokio runtime based on the specified
/// performance profile.
///
/// # Arguments
///
/// * `high_performance` - Optimized for high-throughput node environments.
/// * `memory_efficient` - Optimized for low-footprint tooling environments.
/// * `default` - Worker threads auto-detected based on available parallelism.
///
/// # Examples
///
/// ```rust,ignore
/// #[stx_runtime::main(high_performance)]
/// async fn main() -> Result<(), ()> {
/// # Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// A high-level attribute macro for defining domain-specific error enums.
///
/// Transforms a standard enum into a fully-featured error type integrated
/// with the node infrastructure.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]`.
/// * **Context Support**: Generates a companion `...Ext` trait that adds
///   `.context()` to any `Result` that can be converted into this error type.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a
///   `source` field, enabling the use of the `?` operator for upstream errors.
/// * **Internal Fallback**: Provides `From<&str>` and `From<String>`
///   implementations if an `Internal` variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. Variants that support context must include a
///    `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping external errors must include a `source: T` field or a
///    field marked with `#[source]`/`#[from]` (compatible with `thiserror`).
///
/// # Example
///
/// ```rust,ignore
/// use stx_derive::stx_error;
/// use std::borrow::Cow;
///
/// #[stx_error]
/// pub enum StoreError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn stx_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Attribute macro to define a feature-slice handle.
///
/// This macro transforms a struct into the full slice pattern:
/// 1. Generates a thread-safe `Arc` wrapper.
/// 2. Implements `Deref` for transparent access to the inner state.
/// 3. Implements `FeatureSlice` for registration in the kernel.
///
/// # Example
/// ```rust,ignore
/// #[stx_derive::stx_slice]
/// pub struct Debug {
///     pub chain: Chain,
/// }
///
/// fn init(chain: Chain) -> Debug {
///     Debug::new(DebugInner { chain })
/// }
/// ```
#[proc_macro_attribute]
pub fn stx_slice(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as ItemStruct);
    macros::slice::expand_slice(input).into()
}
