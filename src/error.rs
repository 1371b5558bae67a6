use thiserror::Error;

/// Fatal error conditions for the counter core: invariant violations and
/// argument errors the caller must see.
///
/// Representation-policy transitions (sparse capacity exceeded, ineffective
/// compression) are not modeled here — they are handled locally by the
/// affected operation, never surfaced to the caller.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HllError {
    #[error("error rate must be in (0, 1), got {0}")]
    InvalidErrorRate(f64),

    #[error("precision (index bits) {0} outside [{min}, {max}]", min = crate::params::MIN_B, max = crate::params::MAX_B)]
    PrecisionOutOfRange(i32),

    #[error(
        "register width {0} outside [{min}, {max}]",
        min = crate::params::MIN_BINBITS,
        max = crate::params::MAX_BINBITS
    )]
    BinBitsOutOfRange(u8),

    #[error("index size of estimators differs ({0} != {1})")]
    PrecisionMismatch(i8, i8),

    #[error("bin size of estimators differs ({0} != {1})")]
    BinBitsMismatch(u8, u8),

    #[error(
        "stored counter is version {found} while the library is version {expected}; call upgrade() first"
    )]
    VersionMismatch { found: u8, expected: u8 },

    #[error("malformed counter header: {0}")]
    MalformedHeader(&'static str),

    #[error("malformed counter body: {0}")]
    MalformedBody(&'static str),
}
