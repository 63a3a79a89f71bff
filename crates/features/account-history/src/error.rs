use std::borrow::Cow;

/// Errors raised while wiring the history feature.
#[stx_derive::stx_error]
pub enum HistoryError {
    #[error("Configuration error{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal history error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
