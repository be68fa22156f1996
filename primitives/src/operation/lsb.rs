//! LSB: the shared least-significant bit of a shared value.
//!
//! Masks `x` with a fresh [RandomBitwiseNumber] `r`, reveals `x + r`, then locally XORs the
//! revealed value's own parity with `r`'s already-shared bit-0: XOR against a *public* bit is
//! affine in the remaining share (`r0*(1 - 2c0) + c0`), so this step needs no further
//! interaction. Like the rest of this crate's comparison family, this doesn't handle the
//! masked-sum wraparound edge case Nishide-Ohta's full construction accounts for with extra
//! statistical security margin (SPEC_FULL.md §9 open question).

use super::random_bitwise::RandomBitwiseNumber;
use super::reconstruction::Reconstruction;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::share::PolyDegree;

enum Stage {
    Masking { x_share: FieldElement, mask: RandomBitwiseNumber },
    Revealing { r0_share: FieldElement, reveal: Reconstruction },
    Done(OperationOutcome),
}

/// A single LSB operation instance.
pub struct Lsb {
    id: u64,
    stage: Stage,
}

impl Lsb {
    /// Builds an LSB operation over `x_share`.
    pub fn new(id: u64, x_share: FieldElement, bit_length: u32, rng: ChaCha20Rng) -> Self {
        Self { id, stage: Stage::Masking { x_share, mask: RandomBitwiseNumber::new(id, bit_length, rng) } }
    }
}

impl PrimitiveOperation for Lsb {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::Masking { mask, .. } => mask.outbound_share_count(peer_index),
            Stage::Revealing { reveal, .. } => reveal.outbound_share_count(peer_index),
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::Masking { mask, .. } => mask.copy_outbound_shares(peer_index, buf),
            Stage::Revealing { reveal, .. } => reveal.copy_outbound_shares(peer_index, buf),
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::Masking { mask, .. } => mask.copy_inbound_shares(peer_index, data),
            Stage::Revealing { reveal, .. } => reveal.copy_inbound_shares(peer_index, data),
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        loop {
            match &mut self.stage {
                Stage::Masking { x_share, mask } => {
                    mask.do_step(ctx)?;
                    if !mask.is_complete() {
                        return Ok(());
                    }
                    let OperationOutcome::Success(values) = mask.final_result()? else {
                        self.stage = Stage::Done(OperationOutcome::Failure);
                        return Ok(());
                    };
                    let r_value = values[0];
                    let r0_share = values[1]; // bit 0, the least-significant bit share
                    let field = ctx.sharer.field();
                    let masked_share = field.add(*x_share, r_value);
                    self.stage = Stage::Revealing {
                        r0_share,
                        reveal: Reconstruction::new(self.id, masked_share, PolyDegree::T, ctx.sharer.peer_count()),
                    };
                }
                Stage::Revealing { r0_share, reveal } => {
                    reveal.do_step(ctx)?;
                    if !reveal.is_complete() {
                        return Ok(());
                    }
                    let masked = single_value(reveal.final_result()?, self.id)?;
                    let field = ctx.sharer.field();
                    let bits = field.bit_decompose(masked.value());
                    #[allow(clippy::indexing_slicing)]
                    let c0 = bits[bits.len() - 1];
                    let c0_element = if c0 == 1 { FieldElement::ONE } else { FieldElement::ZERO };
                    // result = r0*(1 - 2*c0) + c0
                    let two_c0 = field.add(c0_element, c0_element);
                    let one_minus_two_c0 = field.sub(FieldElement::ONE, two_c0);
                    let result = field.add(field.mul(*r0_share, one_minus_two_c0), c0_element);
                    self.stage = Stage::Done(OperationOutcome::Success(vec![result]));
                }
                Stage::Done(_) => return Ok(()),
            }
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Done(_))
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        match &self.stage {
            Stage::Done(outcome) => Ok(outcome.clone()),
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "lsb not complete" }),
        }
    }
}
