use std::borrow::Cow;

/// Errors raised while opening, sealing, or unsealing a key store.
#[stx_derive::stx_error]
pub enum KeystoreError {
    /// AEAD authentication failed: wrong passphrase or tampered file.
    #[error("Unsealing failed{}: {message}", format_context(.context))]
    Unsealing { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Sealing failed{}: {message}", format_context(.context))]
    Sealing { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The key file is structurally malformed.
    #[error("Invalid key file{}: {message}", format_context(.context))]
    InvalidPayload { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Postcard serialization error{}: {source}", format_context(.context))]
    Postcard { source: postcard::Error, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal keystore error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
