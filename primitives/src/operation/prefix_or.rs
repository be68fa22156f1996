//! LinearPrefixOr: the shared prefix-OR of a shared bit array.
//!
//! `prefix_or[i] = OR(bits[0], ..., bits[i])`, computed as `1 - product(1 - bits[0..=i])` at each
//! prefix. This implementation chains the prefix products one [Multiplication] at a time
//! (`P_i = P_{i-1} * (1 - bits[i])`), taking `n - 1` sequential rounds — a straightforward
//! reading of the "OR via product" identity rather than the O(1)-round unbounded-fan-in
//! construction Nishide-Ohta build from random invertible masks, which this crate doesn't
//! implement (SPEC_FULL.md §9 open question).

use super::multiplication::Multiplication;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// A single LinearPrefixOr operation instance.
pub struct PrefixOr {
    id: u64,
    complements: Vec<FieldElement>,
    prefix_products: Vec<FieldElement>,
    cursor: usize,
    current: Option<Multiplication>,
    rng: ChaCha20Rng,
    outcome: Option<OperationOutcome>,
}

impl PrefixOr {
    /// Builds a PrefixOr operation over a shared bit array.
    pub fn new(id: u64, bit_shares: Vec<FieldElement>, field: &math_lib::field::Field, rng: ChaCha20Rng) -> Self {
        let complements: Vec<FieldElement> = bit_shares.iter().map(|&b| field.sub(FieldElement::ONE, b)).collect();
        let first = complements.first().copied().unwrap_or(FieldElement::ONE);
        Self { id, complements, prefix_products: vec![first], cursor: 1, current: None, rng, outcome: None }
    }

    fn finish_if_done(&mut self, field: &math_lib::field::Field) {
        if self.cursor >= self.complements.len() {
            let results =
                self.prefix_products.iter().map(|&product| field.sub(FieldElement::ONE, product)).collect();
            self.outcome = Some(OperationOutcome::Success(results));
        }
    }
}

impl PrimitiveOperation for PrefixOr {
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
        let field = ctx.sharer.field();
        self.finish_if_done(field);
        if self.outcome.is_some() {
            return Ok(());
        }
        if self.current.is_none() {
            let previous = self.prefix_products[self.cursor - 1];
            let next_factor = self.complements[self.cursor];
            let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
            self.current = Some(Multiplication::new(self.id.wrapping_add(self.cursor as u64), previous, next_factor, child_rng));
        }
        if let Some(mult) = &mut self.current {
            mult.do_step(ctx)?;
            if mult.is_complete() {
                let OperationOutcome::Success(values) = mult.final_result()? else {
                    self.outcome = Some(OperationOutcome::Failure);
                    return Ok(());
                };
                self.prefix_products.push(values[0]);
                self.current = None;
                self.cursor += 1;
                self.finish_if_done(field);
            }
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "prefix-or not complete" })
    }
}
