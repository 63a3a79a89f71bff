use std::borrow::Cow;

/// Error types shared by all protocol validation and signing paths.
#[stx_derive::stx_error]
pub enum ProtocolError {
    /// A field failed its structural validation rules.
    #[error("Validation failed{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Malformed asset{}: {message}", format_context(.context))]
    InvalidAsset { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Malformed account name{}: {message}", format_context(.context))]
    InvalidName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A key or signature failed to parse or verify.
    #[error("Cryptographic check failed{}: {source}", format_context(.context))]
    Crypto { source: ed25519_dalek::SignatureError, context: Option<Cow<'static, str>> },

    /// Two signatures in one transaction resolve to the same key.
    #[error("Duplicate signature{}: {message}", format_context(.context))]
    DuplicateSignature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The provided signatures do not satisfy a required authority.
    #[error("Missing authority{}: {message}", format_context(.context))]
    MissingAuthority { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Canonical binary encoding failed.
    #[error("Postcard serialization error{}: {source}", format_context(.context))]
    Encoding { source: postcard::Error, context: Option<Cow<'static, str>> },

    /// Arithmetic on amounts overflowed or mixed symbols.
    #[error("Amount arithmetic failed{}: {message}", format_context(.context))]
    Arithmetic { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal protocol error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
