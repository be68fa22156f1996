//! Reconstruction: reveal a secret to every peer from its shares.

use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use shamir_sharing::share::{PolyDegree, Share};

/// Reveals the secret behind `my_share` by broadcasting it and interpolating everyone's shares.
pub struct Reconstruction {
    id: u64,
    my_share: FieldElement,
    degree: PolyDegree,
    received: Vec<Share>,
    sent: bool,
    result: Option<FieldElement>,
}

impl Reconstruction {
    /// Builds a new Reconstruction over `peer_count` peers, broadcasting `my_share`.
    pub fn new(id: u64, my_share: FieldElement, degree: PolyDegree, peer_count: usize) -> Self {
        Self { id, my_share, degree, received: vec![None; peer_count], sent: false, result: None }
    }
}

impl PrimitiveOperation for Reconstruction {
    fn outbound_share_count(&self, _peer_index: usize) -> usize {
        if self.sent {
            0
        } else {
            1
        }
    }

    fn copy_outbound_shares(&self, _peer_index: usize, buf: &mut Vec<FieldElement>) {
        if !self.sent {
            buf.push(self.my_share);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        if self.result.is_some() {
            return Ok(0);
        }
        let value = *data.first().ok_or(PrimitivesError::Uninitialized("reconstruction share"))?;
        self.received[peer_index - 1] = Some(value);
        Ok(1)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.result.is_some() {
            return Ok(());
        }
        if !self.sent {
            self.sent = true;
            return Ok(());
        }
        match ctx.sharer.recover(&self.received, self.degree) {
            Ok(secret) => {
                self.result = Some(secret);
                Ok(())
            }
            Err(_) => Ok(()), // not enough shares arrived yet; try again next round
        }
    }

    fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.result
            .map(|value| OperationOutcome::Success(vec![value]))
            .ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "reconstruction not complete" })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::predicate_cache::PredicateCache;
    use math_lib::field::Field;
    use rand::{rngs::StdRng, SeedableRng};
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    #[test]
    fn reconstructs_after_all_shares_arrive() {
        let field = Arc::new(Field::new(2147483647).unwrap());
        let sharer = Arc::new(ShamirSecretSharer::new(field.clone(), 2, 5, 1).unwrap());
        let ctx = OperationContext { sharer: sharer.clone(), predicate_cache: Arc::new(PredicateCache::new()), synchronize_shares: false };
        let mut rng = StdRng::seed_from_u64(3);
        let secret = field.element(99);
        let shares = sharer.generate_shares(secret, PolyDegree::T, &mut rng);

        let mut op = Reconstruction::new(1, shares[0], PolyDegree::T, 5);
        op.do_step(&ctx).unwrap(); // marks sent
        for (index, &share) in shares.iter().enumerate() {
            op.copy_inbound_shares(index + 1, &[share]).unwrap();
        }
        op.do_step(&ctx).unwrap();
        assert!(op.is_complete());
        assert_eq!(op.final_result().unwrap(), OperationOutcome::Success(vec![secret]));
    }
}
