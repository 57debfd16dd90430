use thiserror::Error;

/// Errors raised while decoding chainstate entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The buffer ended while every byte still had its continuation bit set.
    #[error("truncated varint at offset {offset}")]
    TruncatedVarint { offset: usize },

    #[error("varint does not fit in 64 bits")]
    VarintOverflow,

    /// A UTXO value was decoded before the obfuscation key record was seen.
    #[error("obfuscation key has not been observed yet")]
    EmptyObfuscationKey,

    #[error("amount overflow during decompression of {compressed}")]
    AmountOverflow { compressed: u64 },

    #[error("malformed UTXO key of {len} bytes")]
    MalformedKey { len: usize },

    #[error("expected a 20 byte hash, got {len} bytes")]
    InvalidHashLength { len: usize },

    #[error("expected a 33 byte compressed public key, got {len} bytes")]
    InvalidPublicKeyLength { len: usize },

    /// An address primitive rejected its input. Recoverable per record.
    #[error("address encoding failed: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, Error>;
