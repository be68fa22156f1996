//! RandomBitwiseNumber: a fresh secret-shared random number together with shares of its own bits.
//!
//! Built by running `bit_length(p) - 1` independent RandomBit operations and locally composing
//! their shares into a weighted sum, `sum(bit_i * 2^i)`, which needs no further interaction since
//! the composition is linear. Using `bit_length(p) - 1` rather than `bit_length(p)` bits is a
//! deliberate simplification over full Nishide-Ohta `PRandInt` (which draws `bit_length(p)` bits
//! and rejects/re-masks candidates `>= p` via a reveal of a masked difference): since `p` has
//! `bit_length(p)` bits, `2^(bit_length(p) - 1) <= p`, so every candidate this produces is
//! guaranteed below `p` and this operation never needs to reject purely for range — the only
//! remaining failure mode is a child RandomBit failing (SPEC_FULL.md §9 open question).

use super::random_bit::RandomBit;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A random number together with shares of each of its bits.
pub struct RandomBitwiseNumber {
    id: u64,
    bits: Vec<RandomBit>,
    outcome: Option<OperationOutcome>,
}

impl RandomBitwiseNumber {
    /// Builds a new RandomBitwiseNumber, drawing `bit_length - 1` bits.
    pub fn new(id: u64, bit_length: u32, mut rng: ChaCha20Rng) -> Self {
        let count = bit_length.saturating_sub(1).max(1) as usize;
        let bits = (0..count)
            .map(|i| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                RandomBit::new(id.wrapping_add(i as u64), child_rng)
            })
            .collect();
        Self { id, bits, outcome: None }
    }

    fn incomplete_bits(&self) -> impl Iterator<Item = &RandomBit> {
        self.bits.iter().filter(|bit| !bit.is_complete())
    }

    fn incomplete_bits_mut(&mut self) -> impl Iterator<Item = &mut RandomBit> {
        self.bits.iter_mut().filter(|bit| !bit.is_complete())
    }
}

impl PrimitiveOperation for RandomBitwiseNumber {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.incomplete_bits().map(|bit| bit.outbound_share_count(peer_index)).sum()
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        for bit in self.incomplete_bits() {
            bit.copy_outbound_shares(peer_index, buf);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        let mut consumed = 0;
        for bit in self.incomplete_bits_mut() {
            consumed += bit.copy_inbound_shares(peer_index, &data[consumed..])?;
        }
        Ok(consumed)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        for bit in self.bits.iter_mut().filter(|bit| !bit.is_complete()) {
            bit.do_step(ctx)?;
        }
        if self.bits.iter().all(|bit| bit.is_complete()) {
            let field = ctx.sharer.field();
            let mut value = FieldElement::ZERO;
            let mut bit_shares = Vec::with_capacity(self.bits.len());
            for (i, bit) in self.bits.iter().enumerate() {
                match bit.final_result()? {
                    OperationOutcome::Success(values) => {
                        let share = values[0];
                        let weight = field.pow(field.element(2), i as u64);
                        value = field.add(value, field.mul(share, weight));
                        bit_shares.push(share);
                    }
                    OperationOutcome::Failure => {
                        self.outcome = Some(OperationOutcome::Failure);
                        return Ok(());
                    }
                }
            }
            let mut result = vec![value];
            result.extend(bit_shares);
            self.outcome = Some(OperationOutcome::Success(result));
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "bitwise number not complete" })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn draws_fewer_than_full_bit_length_bits() {
        let rng = ChaCha20Rng::seed_from_u64(4);
        let op = RandomBitwiseNumber::new(1, 31, rng);
        assert_eq!(op.bits.len(), 30);
    }
}
