use std::borrow::Cow;

/// Errors raised while configuring or installing the global subscriber.
#[stx_derive::stx_error]
pub enum LoggerError {
    #[error("Invalid logger configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A global subscriber was already installed.
    #[error("Subscriber installation failed{}: {source}", format_context(.context))]
    Subscriber {
        source: tracing_subscriber::util::TryInitError,
        context: Option<Cow<'static, str>>,
    },

    /// The rolling file appender rejected its configuration.
    #[error("File appender setup failed{}: {source}", format_context(.context))]
    Appender {
        source: tracing_appender::rolling::InitError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal logger error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
