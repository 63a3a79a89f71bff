use std::borrow::Cow;

/// Errors raised while wiring the token feature.
#[stx_derive::stx_error]
pub enum TokenFeatureError {
    #[error("Configuration error{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal token feature error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
