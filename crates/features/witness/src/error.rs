use std::borrow::Cow;

/// Errors raised while wiring or running block production.
#[stx_derive::stx_error]
pub enum WitnessError {
    #[error("Chain error{}: {source}", format_context(.context))]
    Chain { source: stx_chain::ChainError, context: Option<Cow<'static, str>> },

    #[error("Keystore error{}: {source}", format_context(.context))]
    Keystore { source: stx_keystore::KeystoreError, context: Option<Cow<'static, str>> },

    /// The witness configuration cannot be used as written.
    #[error("Configuration error{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal witness error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
