//! Multiplication: the Gennaro-Rabin-Rabin degree-reduction protocol.
//!
//! Each peer multiplies its own shares of `a` and `b` locally, producing a point on a
//! degree-`2t` polynomial through `ab`. To hand back a degree-`t` sharing, each peer re-shares
//! its local product at degree `t` and sends one share of it to every other peer; a peer then
//! combines what it received by interpolating that degree-`2t` polynomial at zero, which needs
//! `2t + 1` present reshares, not `t + 1` (SPEC_FULL.md §4.B, §4.C).
//!
//! With `synchronize_shares` enabled, a peer doesn't interpolate the instant it has `2t + 1`
//! reshares of its own: it first confirms, via [Synchronization], that every other surviving
//! peer saw the same set of reshares arrive, zeroing out any slot the group didn't unanimously
//! agree on before interpolating. Without this, two peers who received different (but each
//! individually sufficient) subsets of reshares still recover the same value mathematically —
//! any `2t + 1` genuine points on a degree-`2t` polynomial agree — but disagree on *which* peers
//! they consider present, a divergence that surfaces downstream (SPEC_FULL.md §4.C step 2, §9
//! open question: the handshake itself tolerates at most one peer failing mid-handshake).

use super::synchronization::Synchronization;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::share::{PolyDegree, Share};

enum Stage {
    AwaitingReshare { local_a: FieldElement, local_b: FieldElement },
    AwaitingCombine { reshares: Vec<FieldElement>, received: Vec<Share> },
    /// Every peer secret-shares (degree `t`) its own bit-per-slot view of which reshares it
    /// received, one sharing per slot, so [Synchronization] can later AND them across peers.
    SharingMasks { reshares: Vec<FieldElement>, received: Vec<Share>, mask_shares: Vec<Vec<FieldElement>>, mask_received: Vec<Vec<Share>> },
    /// One [Synchronization] per slot, each revealing whether every peer's mask agreed that
    /// slot's reshare was present.
    Combining { reshares: Vec<FieldElement>, received: Vec<Share>, syncs: Vec<Synchronization> },
    Done(FieldElement),
}

/// One Multiplication operation instance.
pub struct Multiplication {
    id: u64,
    stage: Stage,
    rng: ChaCha20Rng,
    /// Skips the share-synchronization handshake unconditionally, even if the context asks for
    /// it. Set only for Multiplications that are themselves part of that handshake's own
    /// machinery (see [super::product::Product::new_unsynchronized]) to avoid recursing.
    skip_sync: bool,
}

impl Multiplication {
    /// Builds a Multiplication over this peer's local shares `share_a` and `share_b`, seeding its
    /// internal reshare polynomial from `rng`.
    pub fn new(id: u64, share_a: FieldElement, share_b: FieldElement, rng: ChaCha20Rng) -> Self {
        Self { id, stage: Stage::AwaitingReshare { local_a: share_a, local_b: share_b }, rng, skip_sync: false }
    }

    /// Like [Self::new], but never runs the share-synchronization handshake regardless of
    /// [OperationContext::synchronize_shares].
    pub(crate) fn new_unsynchronized(id: u64, share_a: FieldElement, share_b: FieldElement, rng: ChaCha20Rng) -> Self {
        Self { id, stage: Stage::AwaitingReshare { local_a: share_a, local_b: share_b }, rng, skip_sync: true }
    }

    fn needed(ctx: &OperationContext) -> usize {
        2 * ctx.sharer.degree() as usize + 1
    }
}

impl PrimitiveOperation for Multiplication {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::AwaitingReshare { .. } => 0,
            Stage::AwaitingCombine { reshares, .. } => usize::from(!reshares.is_empty()),
            Stage::SharingMasks { reshares, mask_shares, .. } => {
                usize::from(!reshares.is_empty()) + mask_shares.get(peer_index - 1).map_or(0, Vec::len)
            }
            Stage::Combining { reshares, syncs, .. } => {
                usize::from(!reshares.is_empty())
                    + syncs.iter().map(|sync| sync.outbound_share_count(peer_index)).sum::<usize>()
            }
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::AwaitingReshare { .. } => {}
            Stage::AwaitingCombine { reshares, .. } => {
                if let Some(&share) = reshares.get(peer_index - 1) {
                    buf.push(share);
                }
            }
            Stage::SharingMasks { reshares, mask_shares, .. } => {
                if let Some(&share) = reshares.get(peer_index - 1) {
                    buf.push(share);
                }
                if let Some(shares) = mask_shares.get(peer_index - 1) {
                    buf.extend_from_slice(shares);
                }
            }
            Stage::Combining { reshares, syncs, .. } => {
                if let Some(&share) = reshares.get(peer_index - 1) {
                    buf.push(share);
                }
                for sync in syncs {
                    sync.copy_outbound_shares(peer_index, buf);
                }
            }
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::AwaitingReshare { .. } => Ok(0),
            Stage::AwaitingCombine { received, .. } => {
                let value = *data.first().ok_or(PrimitivesError::Uninitialized("multiplication reshare"))?;
                received[peer_index - 1] = Some(value);
                Ok(1)
            }
            Stage::SharingMasks { received, mask_received, .. } => {
                let peer_count = mask_received.len();
                let mut consumed = 0;
                if let Some(&value) = data.first() {
                    received[peer_index - 1] = received[peer_index - 1].or(Some(value));
                    consumed += 1;
                }
                for slot in 0..peer_count {
                    if let Some(&value) = data.get(consumed + slot) {
                        mask_received[peer_index - 1][slot] = Some(value);
                    }
                }
                consumed += peer_count;
                Ok(consumed)
            }
            Stage::Combining { received, syncs, .. } => {
                let mut consumed = 0;
                if let Some(&value) = data.first() {
                    received[peer_index - 1] = received[peer_index - 1].or(Some(value));
                    consumed += 1;
                }
                for sync in syncs.iter_mut() {
                    consumed += sync.copy_inbound_shares(peer_index, &data[consumed..])?;
                }
                Ok(consumed)
            }
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        match &mut self.stage {
            Stage::AwaitingReshare { local_a, local_b } => {
                let local_product = ctx.sharer.field().mul(*local_a, *local_b);
                let reshares = ctx.sharer.generate_shares(local_product, PolyDegree::T, &mut self.rng);
                let peer_count = reshares.len();
                self.stage = Stage::AwaitingCombine { reshares, received: vec![None; peer_count] };
                Ok(())
            }
            Stage::AwaitingCombine { reshares, received } => {
                if !ctx.synchronize_shares || self.skip_sync {
                    return match ctx.sharer.recover(received, PolyDegree::TwoT) {
                        Ok(combined) => {
                            self.stage = Stage::Done(combined);
                            Ok(())
                        }
                        Err(_) => Ok(()),
                    };
                }
                if received.iter().filter(|share| share.is_some()).count() < Self::needed(ctx) {
                    return Ok(());
                }
                let peer_count = received.len();
                let mut mask_shares = vec![Vec::with_capacity(peer_count); peer_count];
                for slot in 0..peer_count {
                    let bit = if received[slot].is_some() { FieldElement::ONE } else { FieldElement::ZERO };
                    let shares = ctx.sharer.generate_shares(bit, PolyDegree::T, &mut self.rng);
                    for (peer_idx, share) in shares.into_iter().enumerate() {
                        mask_shares[peer_idx].push(share);
                    }
                }
                let reshares = std::mem::take(reshares);
                let received = std::mem::take(received);
                self.stage = Stage::SharingMasks {
                    reshares,
                    received,
                    mask_shares,
                    mask_received: vec![vec![None; peer_count]; peer_count],
                };
                Ok(())
            }
            Stage::SharingMasks { reshares, received, mask_received, .. } => {
                let senders_ready = mask_received.iter().filter(|slots| slots.iter().all(Option::is_some)).count();
                if senders_ready < Self::needed(ctx) {
                    return Ok(());
                }
                let peer_count = mask_received.len();
                let mut syncs = Vec::with_capacity(peer_count);
                for slot in 0..peer_count {
                    let readiness_shares: Vec<FieldElement> = mask_received
                        .iter()
                        .map(|slots| slots[slot].unwrap_or(FieldElement::ZERO))
                        .collect();
                    let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                    syncs.push(Synchronization::new(self.id.wrapping_add(1000 + slot as u64), readiness_shares, child_rng));
                }
                let reshares = std::mem::take(reshares);
                let received = std::mem::take(received);
                self.stage = Stage::Combining { reshares, received, syncs };
                Ok(())
            }
            Stage::Combining { received, syncs, .. } => {
                for sync in syncs.iter_mut() {
                    sync.do_step(ctx)?;
                }
                if !syncs.iter().all(Synchronization::is_complete) {
                    return Ok(());
                }
                for (slot, sync) in syncs.iter().enumerate() {
                    let OperationOutcome::Success(values) = sync.final_result()? else {
                        return Err(PrimitivesError::UnexpectedState {
                            id: self.id,
                            detail: "share-synchronization handshake produced no result",
                        });
                    };
                    if values[0] == FieldElement::ZERO {
                        received[slot] = None;
                    }
                }
                match ctx.sharer.recover(received, PolyDegree::TwoT) {
                    Ok(combined) => self.stage = Stage::Done(combined),
                    Err(_) => {} // the intersected support set fell below threshold; wait (no new reshares will arrive)
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
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "multiplication not complete" }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::predicate_cache::PredicateCache;
    use math_lib::field::Field;
    use rand::SeedableRng;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    fn ctx(sharer: Arc<ShamirSecretSharer>, synchronize_shares: bool) -> OperationContext {
        OperationContext { sharer, predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares }
    }

    #[test]
    fn multiplies_shared_values() {
        let field = Arc::new(Field::new(2147483647).unwrap());
        let peer_count = 5;
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 2, peer_count, 1).unwrap());
        let ctx = ctx(sharer.clone(), false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);

        let a = field.element(6);
        let b = field.element(7);
        let a_shares = sharer.generate_shares(a, PolyDegree::T, &mut rng);
        let b_shares = sharer.generate_shares(b, PolyDegree::T, &mut rng);

        // Every peer runs its own Multiplication instance; collect the reshares each sends to
        // peer 1 and feed them back in to recover peer 1's new share.
        let mut ops: Vec<Multiplication> = (0..peer_count)
            .map(|i| {
                let seed = ChaCha20Rng::seed_from_u64(100 + i as u64);
                Multiplication::new(i as u64, a_shares[i], b_shares[i], seed)
            })
            .collect();
        for op in &mut ops {
            op.do_step(&ctx).unwrap();
        }
        let mut reshares_to_peer1 = Vec::new();
        for op in &ops {
            let mut buf = Vec::new();
            op.copy_outbound_shares(1, &mut buf);
            reshares_to_peer1.push(buf[0]);
        }
        let mut peer1_op = Multiplication::new(999, a_shares[0], b_shares[0], ChaCha20Rng::seed_from_u64(1));
        peer1_op.do_step(&ctx).unwrap();
        for (sender_index, &share) in reshares_to_peer1.iter().enumerate() {
            peer1_op.copy_inbound_shares(sender_index + 1, &[share]).unwrap();
        }
        peer1_op.do_step(&ctx).unwrap();
        assert!(peer1_op.is_complete());
        let OperationOutcome::Success(values) = peer1_op.final_result().unwrap() else { panic!("expected success") };
        assert_eq!(values[0], field.mul(a, b));
    }

    #[test]
    fn fails_to_combine_below_twot_threshold_even_though_t_plus_one_present() {
        // peer_count = 5, t = 2: 2t+1 = 5 needed, t+1 = 3. Feeding exactly 3 (the old, wrong
        // threshold) must NOT let the operation complete.
        let field = Arc::new(Field::new(2147483647).unwrap());
        let peer_count = 5;
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 2, peer_count, 1).unwrap());
        let ctx = ctx(sharer.clone(), false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);

        let a = field.element(10);
        let b = field.element(20);
        let a_shares = sharer.generate_shares(a, PolyDegree::T, &mut rng);
        let b_shares = sharer.generate_shares(b, PolyDegree::T, &mut rng);

        let mut ops: Vec<Multiplication> = (0..peer_count)
            .map(|i| Multiplication::new(i as u64, a_shares[i], b_shares[i], ChaCha20Rng::seed_from_u64(50 + i as u64)))
            .collect();
        for op in &mut ops {
            op.do_step(&ctx).unwrap();
        }
        let mut peer1_op = Multiplication::new(999, a_shares[0], b_shares[0], ChaCha20Rng::seed_from_u64(1));
        peer1_op.do_step(&ctx).unwrap();
        for sender_index in 0..3 {
            let mut buf = Vec::new();
            ops[sender_index].copy_outbound_shares(1, &mut buf);
            peer1_op.copy_inbound_shares(sender_index + 1, &[buf[0]]).unwrap();
        }
        peer1_op.do_step(&ctx).unwrap();
        assert!(!peer1_op.is_complete(), "3 of 5 shares must not satisfy the 2t+1=5 threshold");
    }

    #[test]
    fn synchronize_shares_reaches_agreement_when_all_peers_present() {
        let field = Arc::new(Field::new(2147483647).unwrap());
        let peer_count = 4;
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 1, peer_count, 1).unwrap());
        let ctx = ctx(sharer.clone(), true);
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);

        let a = field.element(3);
        let b = field.element(4);
        let a_shares = sharer.generate_shares(a, PolyDegree::T, &mut rng);
        let b_shares = sharer.generate_shares(b, PolyDegree::T, &mut rng);

        let mut ops: Vec<Multiplication> = (0..peer_count)
            .map(|i| Multiplication::new(i as u64, a_shares[i], b_shares[i], ChaCha20Rng::seed_from_u64(70 + i as u64)))
            .collect();

        // Run every peer's instance to completion, fully connecting all-to-all each round.
        for _ in 0..20 {
            if ops.iter().all(Multiplication::is_complete) {
                break;
            }
            for op in &mut ops {
                op.do_step(&ctx).unwrap();
            }
            // messages[sender][recipient] = what peer `sender` sends peer `recipient` this round.
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
        assert!(ops.iter().all(Multiplication::is_complete));
        for op in &ops {
            let OperationOutcome::Success(values) = op.final_result().unwrap() else { panic!("expected success") };
            assert_eq!(values[0], field.mul(a, b));
        }
    }
}
