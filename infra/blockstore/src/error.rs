use std::borrow::Cow;

/// A specialized [`BlockStoreError`] enum of this crate.
#[stx_derive::stx_error]
pub enum BlockStoreError {
    #[error("Block not found{}: {message}", format_context(.context))]
    BlockNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Appends must extend the log by exactly one block.
    #[error("Out-of-order append{}: {message}", format_context(.context))]
    OutOfOrder { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The head marker or a block file holds data the store cannot interpret.
    #[error("Corrupted block log{}: {message}", format_context(.context))]
    Corrupted { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Decompression failure{}: {source}", format_context(.context))]
    Decompress { source: lz4_flex::block::DecompressError, context: Option<Cow<'static, str>> },
}
