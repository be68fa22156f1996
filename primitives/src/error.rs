//! Error taxonomy for the Primitives engine.
//!
//! Layered the way `shamir-sharing` and `math_lib` are: a `thiserror` enum per boundary, with
//! `#[from]` conversions threading lower-layer errors upward untouched. `anyhow` is not used here
//! — every error an operation can produce is enumerable ahead of time.

use shamir_sharing::errors::RecoverSecretError;
use thiserror::Error;

/// A malformed operation was requested of the scheduler (bad constructor arguments).
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An operand vector's length didn't match what the operation expects.
    #[error("operation {operation} expected {expected} operands, got {got}")]
    OperandCountMismatch {
        /// The operation's name, for diagnostics.
        operation: &'static str,
        /// The expected operand count.
        expected: usize,
        /// The operand count actually supplied.
        got: usize,
    },

    /// An interval bound or bit-length argument was out of the supported range.
    #[error("argument {name} out of range: {detail}")]
    ArgumentOutOfRange {
        /// The argument's name.
        name: &'static str,
        /// Human-readable detail.
        detail: String,
    },
}

/// An error produced while driving an in-flight operation.
#[derive(Error, Debug)]
pub enum PrimitivesError {
    /// A reveal or share-combine step didn't have enough peer shares available.
    #[error(transparent)]
    Recovery(#[from] RecoverSecretError),

    /// An operation's `do_step` was invoked after it already reported completion, or a result
    /// was requested before completion.
    #[error("operation {id} is in an unexpected state: {detail}")]
    UnexpectedState {
        /// The operation's id, for diagnostics.
        id: u64,
        /// Human-readable detail.
        detail: &'static str,
    },

    /// A sub-operation's buffers were read before it was ever stepped.
    #[error("operand {0} was never initialized")]
    Uninitialized(&'static str),

    /// A randomized operation (RandomBitwiseNumber and anything built on it) exhausted its
    /// rejection-sampling budget without producing a value below the field's bound — this is an
    /// expected, if rare, outcome rather than a bug (SPEC_FULL.md §4.C).
    #[error("randomized operation failed to produce a value within its retry budget")]
    RandomizationFailed,

    /// A peer sent data belonging to an operation this peer never scheduled, or too much/too
    /// little data for the operations it expects this round.
    #[error("received malformed round data: {0}")]
    MalformedRoundData(String),

    /// Malformed construction arguments, threaded through unchanged.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
