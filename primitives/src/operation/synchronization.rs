//! Synchronization: an AND-broadcast used to agree on whether every peer is ready to proceed.
//!
//! Each peer shares its own local readiness bit (`1` = ready); the combined result (via
//! [super::product::Product] over the readiness shares) is `1` only if every peer contributed
//! `1`. Used ahead of Multiplication's mask-intersection handshake when `synchronize_shares` is
//! enabled (SPEC_FULL.md §4.C, §4.F) — a cheap way to let the whole operation set (not just one
//! pairwise exchange) agree on readiness in a single reveal.

use super::product::Product;
use super::reconstruction::Reconstruction;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::share::PolyDegree;

enum Stage {
    Combining(Product),
    Revealing(Reconstruction),
    Done(OperationOutcome),
}

/// A single Synchronization operation instance.
pub struct Synchronization {
    id: u64,
    stage: Stage,
}

impl Synchronization {
    /// Builds a Synchronization operation combining this peer's readiness shares for every
    /// participant (including its own).
    pub fn new(id: u64, readiness_shares: Vec<FieldElement>, rng: ChaCha20Rng) -> Self {
        Self { id, stage: Stage::Combining(Product::new_unsynchronized(id, readiness_shares, rng)) }
    }
}

impl PrimitiveOperation for Synchronization {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::Combining(product) => product.outbound_share_count(peer_index),
            Stage::Revealing(reveal) => reveal.outbound_share_count(peer_index),
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::Combining(product) => product.copy_outbound_shares(peer_index, buf),
            Stage::Revealing(reveal) => reveal.copy_outbound_shares(peer_index, buf),
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::Combining(product) => product.copy_inbound_shares(peer_index, data),
            Stage::Revealing(reveal) => reveal.copy_inbound_shares(peer_index, data),
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        loop {
            match &mut self.stage {
                Stage::Combining(product) => {
                    product.do_step(ctx)?;
                    if !product.is_complete() {
                        return Ok(());
                    }
                    let combined = single_value(product.final_result()?, self.id)?;
                    self.stage = Stage::Revealing(Reconstruction::new(
                        self.id,
                        combined,
                        PolyDegree::T,
                        ctx.sharer.peer_count(),
                    ));
                }
                Stage::Revealing(reveal) => {
                    reveal.do_step(ctx)?;
                    if !reveal.is_complete() {
                        return Ok(());
                    }
                    let revealed = single_value(reveal.final_result()?, self.id)?;
                    self.stage = Stage::Done(OperationOutcome::Success(vec![revealed]));
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
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "synchronization not complete" }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::predicate_cache::PredicateCache;
    use math_lib::field::Field;
    use rand::SeedableRng;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    fn run(ctxs: &[OperationContext], mut ops: Vec<Synchronization>) -> Vec<FieldElement> {
        let peer_count = ops.len();
        for _ in 0..20 {
            if ops.iter().all(Synchronization::is_complete) {
                break;
            }
            for (op, ctx) in ops.iter_mut().zip(ctxs) {
                op.do_step(ctx).unwrap();
            }
            let mut messages = vec![vec![Vec::new(); peer_count]; peer_count];
            for (sender, op) in ops.iter().enumerate() {
                for recipient in 0..peer_count {
                    op.copy_outbound_shares(recipient + 1, &mut messages[sender][recipient]);
                }
            }
            for (recipient, op) in ops.iter_mut().enumerate() {
                for sender in 0..peer_count {
                    op.copy_inbound_shares(sender + 1, &messages[sender][recipient]).unwrap();
                }
            }
        }
        assert!(ops.iter().all(Synchronization::is_complete));
        ops.iter().map(|op| single_value(op.final_result().unwrap(), 0).unwrap()).collect()
    }

    #[test]
    fn agrees_on_readiness_only_when_every_peer_voted_ready() {
        let field = Arc::new(Field::new(41).unwrap());
        let peer_count = 4;
        let ctxs: Vec<_> = (1..=peer_count)
            .map(|my_index| OperationContext {
                sharer: Arc::new(ShamirSecretSharer::new(field.clone(), 1, peer_count, my_index).unwrap()),
                predicate_cache: Arc::new(PredicateCache::new()),
                synchronize_shares: false,
            })
            .collect();

        // Every peer votes "ready" (1) for every participant: the AND-broadcast should reveal 1.
        let ready = vec![FieldElement::ONE; peer_count];
        let ops: Vec<Synchronization> = (0..peer_count)
            .map(|i| Synchronization::new(i as u64, ready.clone(), ChaCha20Rng::seed_from_u64(i as u64)))
            .collect();
        let results = run(&ctxs, ops);
        assert!(results.iter().all(|&r| r == FieldElement::ONE));

        // One peer votes "not ready" for participant 2: that slot's AND must reveal 0.
        let mut mixed = vec![FieldElement::ONE; peer_count];
        mixed[2] = FieldElement::ZERO;
        let ops: Vec<Synchronization> = (0..peer_count)
            .map(|i| Synchronization::new(100 + i as u64, mixed.clone(), ChaCha20Rng::seed_from_u64(100 + i as u64)))
            .collect();
        let results = run(&ctxs, ops);
        assert!(results.iter().all(|&r| r == FieldElement::ZERO));
    }
}
