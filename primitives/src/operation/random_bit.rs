//! RandomBit: a fresh, secret-shared random bit (`0` or `1`).
//!
//! Built from RandomNumber, Multiplication and Reconstruction: sample a random `r`, reveal
//! `r^2`, and fold its (locally computed) square root back into `r`'s own share — `(r/s + 1)/2`
//! is `0` or `1` with equal probability, entirely locally once `s` is known, since dividing and
//! shifting a share by public constants is a linear operation (SPEC_FULL.md §4.C). If `r^2`
//! happens to reveal as zero — which only happens when `r` itself was zero — the draw is
//! discarded and this operation reports [crate::result::OperationOutcome::Failure], matching the
//! sentinel-free redesign in SPEC_FULL.md §9: callers that need a bit are expected to retry by
//! scheduling a fresh RandomBit.

use super::multiplication::Multiplication;
use super::random_number::RandomNumber;
use super::reconstruction::Reconstruction;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::share::PolyDegree;

enum Stage {
    SamplingR(RandomNumber),
    Squaring { r_share: FieldElement, mult: Multiplication },
    Revealing { r_share: FieldElement, reveal: Reconstruction },
    Done(OperationOutcome),
}

/// A single RandomBit operation instance.
pub struct RandomBit {
    id: u64,
    stage: Stage,
    rng: ChaCha20Rng,
}

impl RandomBit {
    /// Builds a new RandomBit operation.
    pub fn new(id: u64, mut rng: ChaCha20Rng) -> Self {
        let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
        Self { id, stage: Stage::SamplingR(RandomNumber::new(id, child_rng)), rng }
    }
}

use rand::SeedableRng;

impl PrimitiveOperation for RandomBit {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::SamplingR(op) => op.outbound_share_count(peer_index),
            Stage::Squaring { mult, .. } => mult.outbound_share_count(peer_index),
            Stage::Revealing { reveal, .. } => reveal.outbound_share_count(peer_index),
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::SamplingR(op) => op.copy_outbound_shares(peer_index, buf),
            Stage::Squaring { mult, .. } => mult.copy_outbound_shares(peer_index, buf),
            Stage::Revealing { reveal, .. } => reveal.copy_outbound_shares(peer_index, buf),
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::SamplingR(op) => op.copy_inbound_shares(peer_index, data),
            Stage::Squaring { mult, .. } => mult.copy_inbound_shares(peer_index, data),
            Stage::Revealing { reveal, .. } => reveal.copy_inbound_shares(peer_index, data),
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        loop {
            match &mut self.stage {
                Stage::SamplingR(op) => {
                    op.do_step(ctx)?;
                    if !op.is_complete() {
                        return Ok(());
                    }
                    let r_share = single_value(op.final_result()?, self.id)?;
                    let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                    self.stage =
                        Stage::Squaring { r_share, mult: Multiplication::new(self.id, r_share, r_share, child_rng) };
                }
                Stage::Squaring { r_share, mult } => {
                    mult.do_step(ctx)?;
                    if !mult.is_complete() {
                        return Ok(());
                    }
                    let r_squared_share = single_value(mult.final_result()?, self.id)?;
                    self.stage = Stage::Revealing {
                        r_share: *r_share,
                        reveal: Reconstruction::new(self.id, r_squared_share, PolyDegree::T, ctx.sharer.peer_count()),
                    };
                }
                Stage::Revealing { r_share, reveal } => {
                    reveal.do_step(ctx)?;
                    if !reveal.is_complete() {
                        return Ok(());
                    }
                    let r_squared = single_value(reveal.final_result()?, self.id)?;
                    let field = ctx.sharer.field();
                    if r_squared == FieldElement::ZERO {
                        self.stage = Stage::Done(OperationOutcome::Failure);
                        return Ok(());
                    }
                    let outcome = match field.sqrt(r_squared) {
                        Ok(root) => match field.inv(root) {
                            Ok(inv_root) => {
                                let scaled = field.mul(*r_share, inv_root);
                                let plus_one = field.add(scaled, FieldElement::ONE);
                                let half = field.inv(field.element(2)).unwrap_or(FieldElement::ZERO);
                                OperationOutcome::Success(vec![field.mul(plus_one, half)])
                            }
                            Err(_) => OperationOutcome::Failure,
                        },
                        Err(_) => OperationOutcome::Failure,
                    };
                    self.stage = Stage::Done(outcome);
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
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "random bit not complete" }),
        }
    }
}
