//! Shamir share generation and recovery with crash tolerance.

use crate::{
    errors::{RecoverSecretError, ShamirError},
    party::PartyAbscissas,
    share::{PolyDegree, Share},
};
use math_lib::{
    field::{Field, FieldElement},
    lagrange::Lagrange,
    polynomial::{Point, PointSequence, Polynomial},
};
use rand::RngCore;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

/// Generates and recovers Shamir shares for a fixed set of privacy peers.
///
/// One instance is shared (via `Arc`) by every operation in a scheduler; it owns the field
/// context, the peer→alpha assignment, and a cache of Lagrange weight sets keyed by which peers'
/// shares were present, so that repeated reconstructions over the same crash pattern don't
/// recompute weights from scratch (SPEC_FULL.md §4.B).
pub struct ShamirSecretSharer {
    field: Arc<Field>,
    degree: u64,
    my_peer_index: usize,
    abscissas: PartyAbscissas,
    weight_cache: Mutex<FxHashMap<Vec<bool>, Arc<Lagrange>>>,
}

impl ShamirSecretSharer {
    /// Builds a new sharer.
    ///
    /// `degree` must satisfy `1 <= degree <= (peer_count - 1) / 2`; `my_peer_index` is
    /// 1-based and must be in `1 ..= peer_count`.
    pub fn new(field: Arc<Field>, degree: u64, peer_count: usize, my_peer_index: usize) -> Result<Self, ShamirError> {
        let max_degree = peer_count.saturating_sub(1) as u64 / 2;
        if degree == 0 || degree > max_degree {
            return Err(ShamirError::DegreeOutOfRange { degree, peer_count });
        }
        if my_peer_index == 0 || my_peer_index > peer_count {
            return Err(ShamirError::PeerIndexOutOfRange { index: my_peer_index, peer_count });
        }
        let abscissas = PartyAbscissas::new(&field, peer_count);
        Ok(Self { field, degree, my_peer_index, abscissas, weight_cache: Mutex::new(FxHashMap::default()) })
    }

    /// The field this sharer operates over.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// The configured polynomial degree `t`.
    pub fn degree(&self) -> u64 {
        self.degree
    }

    /// The number of privacy peers.
    pub fn peer_count(&self) -> usize {
        self.abscissas.peer_count()
    }

    /// This peer's own 1-based index.
    pub fn my_peer_index(&self) -> usize {
        self.my_peer_index
    }

    /// This peer's own alpha.
    pub fn my_alpha(&self) -> FieldElement {
        #[allow(clippy::expect_used)]
        self.abscissas.alpha(self.my_peer_index).expect("my_peer_index was validated at construction")
    }

    /// Generates a fresh share for every peer, for the given secret and degree.
    ///
    /// Returns one share per peer, indexed `0 ..= peer_count - 1` for peers `1 ..= peer_count`.
    pub fn generate_shares<R: RngCore>(&self, secret: FieldElement, degree: PolyDegree, rng: &mut R) -> Vec<FieldElement> {
        let poly_degree = match degree {
            PolyDegree::T => self.degree,
            PolyDegree::TwoT => self.degree.saturating_mul(2),
        };
        let polynomial = Polynomial::random_with_constant(&self.field, secret, poly_degree, rng);
        self.abscissas.alphas().iter().map(|&alpha| polynomial.eval(&self.field, alpha)).collect()
    }

    /// Recovers a degree-`T`/`TwoT` secret from a vector of per-peer shares, tolerating missing
    /// entries.
    ///
    /// This is used both to reveal a final result to the application (the Reconstruction
    /// operation) and, with the very same Lagrange machinery, to let a peer combine its
    /// neighbours' re-shared local products into its own new share of a multiplication's result
    /// (SPEC_FULL.md §4.C Multiplication) — the operation is a linear combination either way;
    /// only the caller's interpretation of the output differs.
    pub fn recover(&self, shares: &[Share], degree: PolyDegree) -> Result<FieldElement, RecoverSecretError> {
        let needed = match degree {
            PolyDegree::T => self.degree as usize + 1,
            PolyDegree::TwoT => 2 * self.degree as usize + 1,
        };
        let availability: Vec<bool> = shares.iter().map(Option::is_some).collect();
        let present_count = availability.iter().filter(|present| **present).count();
        if present_count < needed {
            tracing::warn!(needed, got = present_count, ?degree, "not enough shares present to recover secret");
            return Err(RecoverSecretError::NotEnoughShares { needed, got: present_count });
        }

        let lagrange = self.lagrange_for(&availability)?;
        let mut sequence = PointSequence::new();
        for (index, share) in shares.iter().enumerate() {
            if let Some(value) = share {
                let alpha = self.abscissas.alpha(index + 1).ok_or(RecoverSecretError::NotEnoughShares {
                    needed,
                    got: present_count,
                })?;
                sequence.push(Point::new(alpha, *value));
            }
        }
        Ok(lagrange.interpolate(&self.field, &sequence)?)
    }

    fn lagrange_for(&self, availability: &[bool]) -> Result<Arc<Lagrange>, RecoverSecretError> {
        let mut cache = match self.weight_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(lagrange) = cache.get(availability) {
            return Ok(Arc::clone(lagrange));
        }
        let abscissas: Vec<FieldElement> = availability
            .iter()
            .zip(self.abscissas.alphas())
            .filter_map(|(present, alpha)| present.then_some(*alpha))
            .collect();
        let lagrange = Arc::new(Lagrange::new(&self.field, abscissas)?);
        cache.insert(availability.to_vec(), Arc::clone(&lagrange));
        Ok(lagrange)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn sharer(peer_count: usize, degree: u64, my_index: usize) -> ShamirSecretSharer {
        let field = Arc::new(Field::new(2147483647).unwrap());
        ShamirSecretSharer::new(field, degree, peer_count, my_index).unwrap()
    }

    #[test]
    fn share_and_recover_roundtrip() {
        let sharer = sharer(5, 2, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let secret = sharer.field().element(123456);
        let shares: Vec<Share> = sharer.generate_shares(secret, PolyDegree::T, &mut rng).into_iter().map(Some).collect();
        let recovered = sharer.recover(&shares, PolyDegree::T).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn tolerates_missing_shares_up_to_threshold() {
        let sharer = sharer(5, 2, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let secret = sharer.field().element(42);
        let mut shares: Vec<Share> =
            sharer.generate_shares(secret, PolyDegree::T, &mut rng).into_iter().map(Some).collect();
        // t=2 needs t+1=3 present; drop two, leaving exactly 3.
        shares[3] = None;
        shares[4] = None;
        let recovered = sharer.recover(&shares, PolyDegree::T).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn fails_below_threshold() {
        let sharer = sharer(5, 2, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let secret = sharer.field().element(42);
        let mut shares: Vec<Share> =
            sharer.generate_shares(secret, PolyDegree::T, &mut rng).into_iter().map(Some).collect();
        shares[2] = None;
        shares[3] = None;
        shares[4] = None;
        assert!(matches!(sharer.recover(&shares, PolyDegree::T), Err(RecoverSecretError::NotEnoughShares { .. })));
    }

    #[test]
    fn weight_cache_is_reused() {
        let sharer = sharer(5, 2, 1);
        let mut rng = StdRng::seed_from_u64(7);
        for value in [1u64, 2, 3] {
            let secret = sharer.field().element(value);
            let shares: Vec<Share> =
                sharer.generate_shares(secret, PolyDegree::T, &mut rng).into_iter().map(Some).collect();
            assert_eq!(sharer.recover(&shares, PolyDegree::T).unwrap(), secret);
        }
        assert_eq!(sharer.weight_cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn degree_out_of_range_is_rejected() {
        let field = Arc::new(Field::new(41).unwrap());
        assert!(ShamirSecretSharer::new(field, 10, 5, 1).is_err());
    }
}
