//! Product: the running product of a list of shared values via a balanced multiplication tree.
//!
//! Pairs at each level are multiplied concurrently (one [Multiplication] sub-operation per
//! pair); an odd value out at a level carries forward unmultiplied to the next. This halves the
//! number of live values each level, taking `ceil(log2(n))` rounds rather than `n - 1` sequential
//! multiplications (SPEC_FULL.md §4.C).

use super::multiplication::Multiplication;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use itertools::Itertools;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A single Product operation instance.
pub struct Product {
    id: u64,
    level: Vec<FieldElement>,
    active: Vec<Multiplication>,
    rng: ChaCha20Rng,
    outcome: Option<OperationOutcome>,
    /// Skips each level's Multiplications' own share-synchronization handshake. Set for
    /// [super::synchronization::Synchronization]'s internal use, where this Product *is* the
    /// machinery combining a share-synchronization mask — letting its own Multiplications run
    /// another layer of the same handshake would recurse without bound.
    unsynchronized: bool,
}

impl Product {
    /// Builds a Product operation over `shares`. Must have at least one element.
    pub fn new(id: u64, shares: Vec<FieldElement>, rng: ChaCha20Rng) -> Self {
        Self::build(id, shares, rng, false)
    }

    /// Like [Self::new], but its Multiplications never run the share-synchronization handshake
    /// regardless of [super::OperationContext::synchronize_shares].
    pub(crate) fn new_unsynchronized(id: u64, shares: Vec<FieldElement>, rng: ChaCha20Rng) -> Self {
        Self::build(id, shares, rng, true)
    }

    fn build(id: u64, shares: Vec<FieldElement>, rng: ChaCha20Rng, unsynchronized: bool) -> Self {
        let mut op = Self { id, level: shares, active: Vec::new(), rng, outcome: None, unsynchronized };
        op.start_level();
        op
    }

    fn start_level(&mut self) {
        if self.level.len() <= 1 {
            if let Some(&value) = self.level.first() {
                self.outcome = Some(OperationOutcome::Success(vec![value]));
            }
            return;
        }
        let mut active = Vec::new();
        for (i, (a, b)) in self.level.iter().copied().tuples().enumerate() {
            let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
            let id = self.id.wrapping_add(i as u64);
            let mult = if self.unsynchronized {
                Multiplication::new_unsynchronized(id, a, b, child_rng)
            } else {
                Multiplication::new(id, a, b, child_rng)
            };
            active.push(mult);
        }
        self.active = active;
        // The odd value out, if any, carries to the next level as-is, appended after this
        // level's products are folded in (see `do_step`).
    }
}

impl PrimitiveOperation for Product {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.active.iter().map(|mult| mult.outbound_share_count(peer_index)).sum()
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        for mult in &self.active {
            mult.copy_outbound_shares(peer_index, buf);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        let mut consumed = 0;
        for mult in &mut self.active {
            consumed += mult.copy_inbound_shares(peer_index, &data[consumed..])?;
        }
        Ok(consumed)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        for mult in &mut self.active {
            mult.do_step(ctx)?;
        }
        if self.active.iter().all(Multiplication::is_complete) {
            let odd_one_out = if self.level.len() % 2 == 1 { self.level.last().copied() } else { None };
            let mut next_level = Vec::with_capacity(self.active.len() + usize::from(odd_one_out.is_some()));
            for mult in &self.active {
                let OperationOutcome::Success(values) = mult.final_result()? else {
                    self.outcome = Some(OperationOutcome::Failure);
                    return Ok(());
                };
                next_level.push(values[0]);
            }
            if let Some(value) = odd_one_out {
                next_level.push(value);
            }
            self.level = next_level;
            self.active.clear();
            self.start_level();
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "product not complete" })
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
    fn single_value_completes_immediately() {
        let field = Arc::new(Field::new(41).unwrap());
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 1, 5, 1).unwrap());
        let ctx = OperationContext { sharer, predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false };
        let op = Product::new(1, vec![field.element(9)], ChaCha20Rng::seed_from_u64(1));
        assert!(op.is_complete());
        let _ = ctx;
        assert_eq!(op.final_result().unwrap(), OperationOutcome::Success(vec![field.element(9)]));
    }
}
