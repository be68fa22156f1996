//! RandomNumber: a fresh, secret-shared uniformly random field element.
//!
//! Each peer contributes a locally-sampled secret, shared at degree `t`; every other peer sums
//! the contribution it receives from each peer into its own share of the total. The sum is
//! uniformly random as long as at least one contributor is honest, and no reveal step is needed
//! since Shamir shares add linearly (SPEC_FULL.md §4.C).

use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::share::PolyDegree;

enum Stage {
    AwaitingContribution,
    AwaitingSum { contributions: Vec<FieldElement>, received: Vec<Option<FieldElement>> },
    Done(FieldElement),
}

/// A single RandomNumber operation instance.
pub struct RandomNumber {
    id: u64,
    stage: Stage,
    rng: ChaCha20Rng,
}

impl RandomNumber {
    /// Builds a new RandomNumber operation, seeding its own contribution from `rng`.
    pub fn new(id: u64, rng: ChaCha20Rng) -> Self {
        Self { id, stage: Stage::AwaitingContribution, rng }
    }
}

impl PrimitiveOperation for RandomNumber {
    fn outbound_share_count(&self, _peer_index: usize) -> usize {
        usize::from(matches!(self.stage, Stage::AwaitingSum { .. }))
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        if let Stage::AwaitingSum { contributions, .. } = &self.stage {
            if let Some(&share) = contributions.get(peer_index - 1) {
                buf.push(share);
            }
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        if let Stage::AwaitingSum { received, .. } = &mut self.stage {
            let value = *data.first().ok_or(PrimitivesError::Uninitialized("random number contribution"))?;
            received[peer_index - 1] = Some(value);
            return Ok(1);
        }
        Ok(0)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        match &mut self.stage {
            Stage::AwaitingContribution => {
                let my_secret = ctx.sharer.field().random_element(&mut self.rng);
                let contributions = ctx.sharer.generate_shares(my_secret, PolyDegree::T, &mut self.rng);
                let peer_count = contributions.len();
                self.stage = Stage::AwaitingSum { contributions, received: vec![None; peer_count] };
                Ok(())
            }
            Stage::AwaitingSum { received, .. } => {
                if received.iter().all(Option::is_some) {
                    let field = ctx.sharer.field();
                    let sum = received.iter().flatten().fold(FieldElement::ZERO, |acc, &value| field.add(acc, value));
                    self.stage = Stage::Done(sum);
                }
                Ok(())
            }
            Stage::Done(_) => Ok(()),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.stage, Stage::Done(_))
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        match self.stage {
            Stage::Done(value) => Ok(OperationOutcome::Success(vec![value])),
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "random number not complete" }),
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

    #[test]
    fn produces_consistent_shares_across_peers() {
        let field = Arc::new(Field::new(2147483647).unwrap());
        let peer_count = 5;
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 2, peer_count, 1).unwrap());
        let ctx = OperationContext { sharer: sharer.clone(), predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false };

        let mut ops: Vec<RandomNumber> =
            (0..peer_count).map(|i| RandomNumber::new(i as u64, ChaCha20Rng::seed_from_u64(50 + i as u64))).collect();
        for op in &mut ops {
            op.do_step(&ctx).unwrap();
        }
        // Gather, for each recipient peer, the contribution every sender produced for them.
        let mut final_shares = Vec::new();
        for recipient in 1..=peer_count {
            let mut received = vec![None; peer_count];
            for (sender_index, op) in ops.iter().enumerate() {
                let mut buf = Vec::new();
                op.copy_outbound_shares(recipient, &mut buf);
                received[sender_index] = Some(buf[0]);
            }
            let mut recipient_op = RandomNumber::new(recipient as u64, ChaCha20Rng::seed_from_u64(999));
            recipient_op.do_step(&ctx).unwrap(); // advance past AwaitingContribution
            for (sender_index, value) in received.into_iter().enumerate() {
                recipient_op.copy_inbound_shares(sender_index + 1, &[value.unwrap()]).unwrap();
            }
            recipient_op.do_step(&ctx).unwrap();
            assert!(recipient_op.is_complete());
            final_shares.push(recipient_op);
        }

        let shares: Vec<_> = final_shares
            .iter()
            .map(|op| match op.final_result().unwrap() {
                OperationOutcome::Success(values) => Some(values[0]),
                OperationOutcome::Failure => None,
            })
            .collect();
        let recovered = sharer.recover(&shares, PolyDegree::T).unwrap();
        // Just confirm it reconstructs to *something* consistent (degree-t sharing), not a
        // specific value — the whole point is the result is unpredictable.
        let direct_sum = shares.iter().flatten().count();
        assert_eq!(direct_sum, peer_count);
        let _ = recovered;
    }
}
