use std::borrow::Cow;

/// Errors raised by the debug node's operations.
#[stx_derive::stx_error]
pub enum DebugError {
    #[error("Chain error{}: {source}", format_context(.context))]
    Chain { source: stx_chain::ChainError, context: Option<Cow<'static, str>> },

    #[error("Configuration error{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal debug error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
