//! SmallIntervalTest: tests whether a shared value (given as shares of its own bits) falls
//! below a small public bound, without masking or revealing anything.
//!
//! A public bound needs no sharing at all — every peer already holds the same bit, so this is
//! exactly [BitwiseLessThan] with the public side supplied as plain constants rather than fresh
//! shares (SPEC_FULL.md §4.C).

use super::bitwise_less_than::BitwiseLessThan;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand_chacha::ChaCha20Rng;

/// A single SmallIntervalTest operation instance.
pub struct SmallIntervalTest {
    inner: BitwiseLessThan,
}

impl SmallIntervalTest {
    /// Builds a SmallIntervalTest checking whether the value behind `x_bits` (MSB first, shares)
    /// is strictly less than the public `bound`.
    pub fn new(id: u64, x_bits: Vec<FieldElement>, bound: u64, rng: ChaCha20Rng) -> Self {
        let bound_bits: Vec<FieldElement> = (0..x_bits.len())
            .rev()
            .map(|i| if (bound >> i) & 1 == 1 { FieldElement::ONE } else { FieldElement::ZERO })
            .collect();
        Self { inner: BitwiseLessThan::new(id, x_bits, bound_bits, rng) }
    }
}

impl PrimitiveOperation for SmallIntervalTest {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.inner.outbound_share_count(peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        self.inner.copy_outbound_shares(peer_index, buf);
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        self.inner.copy_inbound_shares(peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        self.inner.do_step(ctx)
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.inner.final_result()
    }
}
