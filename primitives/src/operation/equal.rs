//! Equal: a shared bit that is `1` iff two shared values are equal.
//!
//! By Fermat's little theorem, `d^(p-1)` is `1` for any nonzero `d` and `0` for `d = 0`. Raising
//! the shared difference to `p - 1` via [Power] therefore yields a share of that indicator
//! directly — no reveal is needed, since `1 - d^(p-1)` is a local linear transform of the result
//! share (SPEC_FULL.md §4.C).

use super::power::Power;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand_chacha::ChaCha20Rng;

/// A single Equal operation instance.
pub struct Equal {
    id: u64,
    power: Power,
    outcome: Option<OperationOutcome>,
}

impl Equal {
    /// Builds an Equal operation over the shared difference `a_share - b_share`.
    pub fn new(id: u64, a_share: FieldElement, b_share: FieldElement, field: &math_lib::field::Field, rng: ChaCha20Rng) -> Self {
        let diff = field.sub(a_share, b_share);
        Self { id, power: Power::new(id, diff, field.prime() - 1, rng), outcome: None }
    }
}

impl PrimitiveOperation for Equal {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.power.outbound_share_count(peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        self.power.copy_outbound_shares(peer_index, buf);
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        self.power.copy_inbound_shares(peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        self.power.do_step(ctx)?;
        if self.power.is_complete() {
            let indicator = single_value(self.power.final_result()?, self.id)?;
            let field = ctx.sharer.field();
            let equal_share = field.sub(FieldElement::ONE, indicator);
            self.outcome = Some(OperationOutcome::Success(vec![equal_share]));
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "equal not complete" })
    }
}
