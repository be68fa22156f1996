//! Drives a [Scheduler] to completion over a [PrimitivesTransport], one round at a time.
//!
//! Each round: gather this peer's outbound shares per recipient (sent in ascending peer-index
//! order, so two peers racing to read each other's logs see the same order), hand them to the
//! transport, then block on `receive` once per *other* peer. A transport that reports a peer as
//! gone (`receive` returning `Ok(None)`) gets a [PrimitivesMessage::dummy] of zeros substituted
//! in its place so the round's bookkeeping proceeds uniformly (SPEC_FULL.md §4.E, §6) — the
//! scheduler itself never needs to know a peer crashed, only that *some* share arrived.

use crate::error::PrimitivesError;
use crate::message::{PrimitivesMessage, PrimitivesTransport};
use crate::result::RoundResult;
use crate::scheduler::Scheduler;
use math_lib::field::FieldElement;
use thiserror::Error;

/// Errors surfaced while driving a round to completion.
#[derive(Error, Debug)]
pub enum DriverError<E: std::error::Error + Send + Sync + 'static> {
    /// The transport itself failed.
    #[error(transparent)]
    Transport(E),
    /// An in-flight operation failed.
    #[error(transparent)]
    Primitives(#[from] PrimitivesError),
}

/// Drives a [Scheduler]'s operations to completion by exchanging rounds over a [PrimitivesTransport].
pub struct PrimitivesDriver<T: PrimitivesTransport> {
    transport: T,
    scheduler: Scheduler,
}

impl<T: PrimitivesTransport> PrimitivesDriver<T> {
    /// Builds a new driver over `scheduler`, communicating through `transport`.
    pub fn new(transport: T, scheduler: Scheduler) -> Self {
        Self { transport, scheduler }
    }

    /// Gives mutable access to the underlying scheduler, e.g. to `submit` new operations or
    /// `push_batch`/`pop_batch`/`drain_batch` between rounds.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Runs rounds until every operation in the current batch has completed, then drains and
    /// returns their results in submission order as a [RoundResult].
    pub fn run_batch_to_completion(&mut self) -> Result<RoundResult, DriverError<T::Error>> {
        while !self.scheduler.batch_complete() {
            self.run_one_round()?;
        }
        let per_operation = self.scheduler.drain_batch().into_iter().map(|(_, outcome)| outcome).collect();
        Ok(RoundResult::new(per_operation))
    }

    /// Exchanges exactly one round: send this peer's outbound shares to every other peer (in
    /// ascending peer-index order), receive one message per other peer (substituting a dummy for
    /// any the transport reports as gone), feed everything to the scheduler, then step it once.
    pub fn run_one_round(&mut self) -> Result<(), DriverError<T::Error>> {
        let peer_count = self.transport.peer_count();
        let my_index = self.transport.my_peer_index();

        // Shares addressed to this peer itself never touch the transport: feed them straight
        // back into the scheduler, the same data a round-trip through the network would deliver.
        let mut own = Vec::new();
        self.scheduler.copy_outbound_shares(my_index, &mut own);
        self.scheduler.copy_inbound_shares(my_index, &own)?;

        for peer_index in 1..=peer_count {
            if peer_index == my_index {
                continue;
            }
            let mut outbound = Vec::new();
            self.scheduler.copy_outbound_shares(peer_index, &mut outbound);
            self.transport.send(peer_index, PrimitivesMessage::new(my_index, outbound)).map_err(DriverError::Transport)?;
        }

        let expected_len = self.scheduler.outbound_share_count(my_index);
        for _ in 0..peer_count.saturating_sub(1) {
            let message = self.transport.receive().map_err(DriverError::Transport)?;
            let message = message.unwrap_or_else(|| {
                tracing::warn!(my_index, "peer gone this round, substituting a dummy message");
                PrimitivesMessage::dummy(0, expected_len, FieldElement::ZERO)
            });
            if message.sender_index == 0 {
                // A crashed peer's stand-in carries no identity; its zeros apply uniformly, so
                // every other peer's slot is fine with them too. Nothing further to route.
                continue;
            }
            self.scheduler.copy_inbound_shares(message.sender_index, &message.operations_data)?;
        }

        self.scheduler.step()?;
        tracing::debug!(my_index, running = self.scheduler.running_count(), "round complete");
        Ok(())
    }
}

/// Precomputes the set of [crate::operation::random_bitwise::RandomBitwiseNumber] draws a batch
/// of [crate::operation::less_than::LessThan] operations will need, so they can run concurrently
/// with unrelated work already in flight rather than being constructed lazily inside `LessThan`
/// itself mid-round (SPEC_FULL.md §4.C, §4.D).
///
/// Returns one fresh child RNG per requested draw, deterministically derived from `rng` so a
/// driver reproducing a run from the same seed schedules the same masks.
pub fn pregenerate_mask_rngs(count: usize, mut rng: rand_chacha::ChaCha20Rng) -> Vec<rand_chacha::ChaCha20Rng> {
    use rand::SeedableRng;
    (0..count).map(|_| rand_chacha::ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone())).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operation::product::Product;
    use crate::operation::OperationContext;
    use crate::predicate_cache::PredicateCache;
    use math_lib::field::Field;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("loopback transport has no peers to talk to")]
    struct NoPeerError;

    /// A single-peer transport: there's nobody else to exchange a round with, so `run_one_round`
    /// reduces to a local `step()` with no sends or receives.
    struct SoloTransport;

    impl PrimitivesTransport for SoloTransport {
        type Error = NoPeerError;
        fn send(&self, _to_peer_index: usize, _message: PrimitivesMessage) -> Result<(), Self::Error> {
            Err(NoPeerError)
        }
        fn receive(&self) -> Result<Option<PrimitivesMessage>, Self::Error> {
            Err(NoPeerError)
        }
        fn peer_count(&self) -> usize {
            1
        }
        fn my_peer_index(&self) -> usize {
            1
        }
    }

    #[test]
    fn solo_peer_batch_completes_without_any_exchange() {
        let field = Arc::new(Field::new(41).unwrap());
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 1, 5, 1).unwrap());
        let ctx = OperationContext { sharer, predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false };
        let mut scheduler = Scheduler::new(ctx, 4);
        scheduler.submit(1, Box::new(Product::new(1, vec![field.element(7)], ChaCha20Rng::seed_from_u64(1))));

        let mut driver = PrimitivesDriver::new(SoloTransport, scheduler);
        let result = driver.run_batch_to_completion().unwrap();
        assert!(result.ok);
        assert_eq!(result.per_operation.len(), 1);
    }
}
