//! The operation catalogue: one state machine per MPC primitive, all driven through the same
//! round-synchronous contract (SPEC_FULL.md §4.C, §4.G).
//!
//! Every operation — whether a single round of Reconstruction or a multi-round composite like
//! `LessThan` built out of `BitwiseLessThan` and `Lsb` sub-operations — implements
//! [PrimitiveOperation]. Composite operations hold their children directly and walk them
//! pre-order in `do_step`/`copy_*_shares`, skipping any child that has already completed, so a
//! child needing fewer rounds doesn't stall a sibling needing more.

pub mod array_ops;
pub mod batch_random_bitwise;
pub mod bitwise_less_than;
pub mod bloom;
pub mod equal;
pub mod less_than;
pub mod lsb;
pub mod multiplication;
pub mod power;
pub mod prefix_or;
pub mod product;
pub mod random_bit;
pub mod random_bitwise;
pub mod random_number;
pub mod reconstruction;
pub mod small_interval;
pub mod synchronization;

use crate::error::PrimitivesError;
use crate::predicate_cache::PredicateCache;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use shamir_sharing::ShamirSecretSharer;
use std::sync::Arc;

/// Shared, read-only context every operation needs to take a step.
///
/// Cloned cheaply (everything inside is `Arc`); constructed once per [crate::scheduler::Scheduler]
/// and handed down to every operation's `do_step`.
#[derive(Clone)]
pub struct OperationContext {
    /// The secret sharer used for all reconstruct/reshare-combine steps.
    pub sharer: Arc<ShamirSecretSharer>,
    /// The shared `[x < p/2]` predicate cache (SPEC_FULL.md §4.C comparison family).
    pub predicate_cache: Arc<PredicateCache>,
    /// Whether [multiplication::Multiplication] runs its mask-intersection handshake before
    /// combining reshares (SPEC_FULL.md §4.C step 2, [crate::config::EngineConfig::synchronize_shares]).
    pub synchronize_shares: bool,
}

/// The round-synchronous contract every operation in the catalogue implements.
///
/// A scheduler drives operations by alternating `copy_outbound_shares`/network exchange/
/// `copy_inbound_shares` with `do_step`, until `is_complete()` — at which point `final_result()`
/// is called exactly once.
pub trait PrimitiveOperation: Send {
    /// How many field elements this operation wants to send to `peer_index` this round.
    ///
    /// `0` for peers it has nothing to say to this round (including itself) and for operations
    /// that have already completed.
    fn outbound_share_count(&self, peer_index: usize) -> usize;

    /// Appends this round's outbound shares for `peer_index` to `buf`, in the fixed order this
    /// operation (and its sub-operations, pre-order) produces them.
    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>);

    /// Consumes this round's inbound shares from `peer_index`, in the same pre-order the sender
    /// produced them in.
    ///
    /// `data` is a slice positioned exactly at this operation's portion of the round message;
    /// returns the number of elements consumed so a parent composite can advance its own cursor.
    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError>;

    /// Advances this operation (and any not-yet-complete sub-operations, pre-order) by one round.
    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError>;

    /// Whether this operation has produced its final result.
    fn is_complete(&self) -> bool;

    /// The operation's result. Only ever called once `is_complete()` is true.
    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError>;
}

/// Convenience: extracts a single [FieldElement] from a completed operation expected to resolve
/// to exactly one value, turning a multi-valued or failed outcome into an error.
pub(crate) fn single_value(outcome: OperationOutcome, id: u64) -> Result<FieldElement, PrimitivesError> {
    match outcome {
        OperationOutcome::Success(values) if values.len() == 1 => Ok(values[0]),
        OperationOutcome::Success(_) => {
            Err(PrimitivesError::UnexpectedState { id, detail: "expected a single-valued result" })
        }
        OperationOutcome::Failure => Err(PrimitivesError::RandomizationFailed),
    }
}
