//! Power: raises a shared value to a public, non-negative exponent via square-and-multiply.
//!
//! Every squaring or multiply-by-accumulator step is its own [Multiplication] sub-operation, run
//! to completion one at a time (each depends on the previous step's output share), mirroring a
//! classic square-and-multiply loop but with a network round-trip standing in for each multiply
//! (SPEC_FULL.md §4.C).

use super::multiplication::Multiplication;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

enum Step {
    Square,
    MultiplyByBase,
}

/// A single Power operation instance.
pub struct Power {
    id: u64,
    base_share: FieldElement,
    result_share: FieldElement,
    steps: Vec<Step>,
    cursor: usize,
    current: Option<Multiplication>,
    rng: ChaCha20Rng,
    outcome: Option<OperationOutcome>,
}

impl Power {
    /// Builds a Power operation computing `base_share ^ exponent`.
    pub fn new(id: u64, base_share: FieldElement, exponent: u64, rng: ChaCha20Rng) -> Self {
        let mut steps = Vec::new();
        if exponent == 0 {
            // x^0 = 1, independent of the base; no sub-operations needed.
        } else {
            let bit_len = 64 - exponent.leading_zeros();
            for i in (0..bit_len).rev() {
                if i != bit_len - 1 {
                    steps.push(Step::Square);
                }
                if (exponent >> i) & 1 == 1 && i != bit_len - 1 {
                    steps.push(Step::MultiplyByBase);
                }
            }
        }
        let result_share = if exponent == 0 { FieldElement::ONE } else { base_share };
        Self { id, base_share, result_share, steps, cursor: 0, current: None, rng, outcome: None }
    }

    fn next_child_rng(&mut self) -> ChaCha20Rng {
        ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone())
    }
}

impl PrimitiveOperation for Power {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.current.as_ref().map_or(0, |mult| mult.outbound_share_count(peer_index))
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        if let Some(mult) = &self.current {
            mult.copy_outbound_shares(peer_index, buf);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.current {
            Some(mult) => mult.copy_inbound_shares(peer_index, data),
            None => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        if self.current.is_none() {
            if self.cursor >= self.steps.len() {
                self.outcome = Some(OperationOutcome::Success(vec![self.result_share]));
                return Ok(());
            }
            let (a, b) = match self.steps[self.cursor] {
                Step::Square => (self.result_share, self.result_share),
                Step::MultiplyByBase => (self.result_share, self.base_share),
            };
            let rng = self.next_child_rng();
            self.current = Some(Multiplication::new(self.id.wrapping_add(self.cursor as u64), a, b, rng));
        }
        if let Some(mult) = &mut self.current {
            mult.do_step(ctx)?;
            if mult.is_complete() {
                self.result_share = single_value(mult.final_result()?, self.id)?;
                self.current = None;
                self.cursor += 1;
            }
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "power not complete" })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::predicate_cache::PredicateCache;
    use math_lib::field::Field;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    #[test]
    fn exponent_zero_yields_one_with_no_rounds() {
        let field = Arc::new(Field::new(41).unwrap());
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 1, 5, 1).unwrap());
        let ctx = OperationContext { sharer, predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false };
        let mut op = Power::new(1, field.element(7), 0, ChaCha20Rng::seed_from_u64(1));
        op.do_step(&ctx).unwrap();
        assert!(op.is_complete());
        assert_eq!(op.final_result().unwrap(), OperationOutcome::Success(vec![FieldElement::ONE]));
    }
}
