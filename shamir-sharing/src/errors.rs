//! Sharing and recovery errors.

use math_lib::errors::{DivByZero, FieldError, InterpolationError};
use thiserror::Error;

/// Failure constructing a [crate::sharer::ShamirSecretSharer].
#[derive(Error, Debug)]
pub enum ShamirError {
    /// The underlying field couldn't be constructed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The polynomial degree was outside `1 ..= floor((peer_count - 1) / 2)`.
    #[error("polynomial degree {degree} out of range for {peer_count} privacy peers")]
    DegreeOutOfRange {
        /// The requested degree.
        degree: u64,
        /// The number of privacy peers.
        peer_count: usize,
    },

    /// `my_privacy_peer_index` wasn't in `1 ..= peer_count`.
    #[error("peer index {index} out of range for {peer_count} privacy peers")]
    PeerIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of privacy peers.
        peer_count: usize,
    },
}

/// Failure recovering a secret from a share vector.
#[derive(Error, Debug)]
pub enum RecoverSecretError {
    /// Fewer shares were present than the degree being recovered requires.
    #[error("not enough shares to recover: need at least {needed}, got {got}")]
    NotEnoughShares {
        /// Shares required.
        needed: usize,
        /// Shares actually present.
        got: usize,
    },

    /// The underlying interpolation failed.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    /// A share value couldn't be inverted during weight computation.
    #[error(transparent)]
    DivByZero(#[from] DivByZero),
}
