//! BatchRandomBitwiseNumber: draws several [RandomBitwiseNumber]s in one operation set entry.
//!
//! Callers that need many masking values at once (the comparison family's preprocessing, chiefly)
//! submit one `BatchRandomBitwiseNumber` rather than many individual `RandomBitwiseNumber`s, so
//! the scheduler and driver only need to track one id for the whole batch (SPEC_FULL.md §4.C).

use super::random_bitwise::RandomBitwiseNumber;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A batch of independent [RandomBitwiseNumber] draws, stepped together.
pub struct BatchRandomBitwiseNumber {
    id: u64,
    draws: Vec<RandomBitwiseNumber>,
}

impl BatchRandomBitwiseNumber {
    /// Builds a batch of `count` bitwise-random draws, each `bit_length` bits wide.
    pub fn new(id: u64, count: usize, bit_length: u32, mut rng: ChaCha20Rng) -> Self {
        let draws = (0..count)
            .map(|i| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                RandomBitwiseNumber::new(id.wrapping_add(i as u64), bit_length, child_rng)
            })
            .collect();
        Self { id, draws }
    }

    fn incomplete(&self) -> impl Iterator<Item = &RandomBitwiseNumber> {
        self.draws.iter().filter(|draw| !draw.is_complete())
    }

    fn incomplete_mut(&mut self) -> impl Iterator<Item = &mut RandomBitwiseNumber> {
        self.draws.iter_mut().filter(|draw| !draw.is_complete())
    }
}

impl PrimitiveOperation for BatchRandomBitwiseNumber {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.incomplete().map(|draw| draw.outbound_share_count(peer_index)).sum()
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        for draw in self.incomplete() {
            draw.copy_outbound_shares(peer_index, buf);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        let mut consumed = 0;
        for draw in self.incomplete_mut() {
            consumed += draw.copy_inbound_shares(peer_index, &data[consumed..])?;
        }
        Ok(consumed)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        for draw in self.draws.iter_mut().filter(|draw| !draw.is_complete()) {
            draw.do_step(ctx)?;
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.draws.iter().all(RandomBitwiseNumber::is_complete)
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        if !self.is_complete() {
            return Err(PrimitivesError::UnexpectedState { id: self.id, detail: "batch not complete" });
        }
        let mut values = Vec::new();
        for draw in &self.draws {
            match draw.final_result()? {
                OperationOutcome::Success(mut v) => values.append(&mut v),
                OperationOutcome::Failure => return Ok(OperationOutcome::Failure),
            }
        }
        Ok(OperationOutcome::Success(values))
    }
}
