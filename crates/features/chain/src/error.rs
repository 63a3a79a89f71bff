use std::borrow::Cow;

/// Everything that can go wrong while validating, applying, or producing.
#[stx_derive::stx_error]
pub enum ChainError {
    /// A protocol-level validation or signing failure.
    #[error("Protocol error{}: {source}", format_context(.context))]
    Protocol { source: stx_protocol::ProtocolError, context: Option<Cow<'static, str>> },

    /// The block log rejected a read or write.
    #[error("Block log error{}: {source}", format_context(.context))]
    Store { source: stx_blockstore::BlockStoreError, context: Option<Cow<'static, str>> },

    #[error("Unknown account{}: {message}", format_context(.context))]
    UnknownAccount { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unknown witness{}: {message}", format_context(.context))]
    UnknownWitness { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unknown block{}: {message}", format_context(.context))]
    UnknownBlock { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An operation was semantically unusable against the current state.
    #[error("Operation rejected{}: {message}", format_context(.context))]
    OperationRejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Insufficient balance{}: {message}", format_context(.context))]
    InsufficientBalance { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A block failed one of its structural or scheduling checks.
    #[error("Invalid block{}: {message}", format_context(.context))]
    InvalidBlock { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The transaction's reference block does not match the chain.
    #[error("TaPoS check failed{}: {message}", format_context(.context))]
    TaposMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Transaction expired{}: {message}", format_context(.context))]
    Expired { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Duplicate transaction{}: {message}", format_context(.context))]
    DuplicateTransaction { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No undo checkpoint remains to roll back to.
    #[error("Undo history exhausted{}: {message}", format_context(.context))]
    NoUndoHistory { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Canonical encoding failed.
    #[error("Encoding error{}: {source}", format_context(.context))]
    Encoding { source: postcard::Error, context: Option<Cow<'static, str>> },

    #[error("Internal chain error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
