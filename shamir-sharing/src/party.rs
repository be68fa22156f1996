//! Deterministic party-to-abscissa assignment.
//!
//! The engine has a fixed, statically-ordered list of privacy peers (`num_privacy_peers`,
//! `my_privacy_peer_index` in `EngineConfig`) rather than an arbitrary set of `PartyId`s known
//! only at runtime, so abscissa assignment is a pure function of the 1-based peer index instead
//! of the sort-and-map done by the teacher's `PartyMapper` over an unordered `PartyId` set.

use math_lib::field::{Field, FieldElement};

/// Maps 1-based privacy peer indices to their fixed public evaluation point (alpha).
#[derive(Clone)]
pub struct PartyAbscissas {
    alphas: Vec<FieldElement>,
}

impl PartyAbscissas {
    /// Assigns alphas `2, 3, ..., peer_count + 1` to peers `1, 2, ..., peer_count`.
    ///
    /// Starting at 2 keeps every alpha distinct, non-zero and non-one, as required by
    /// SPEC_FULL.md §3.
    pub fn new(field: &Field, peer_count: usize) -> Self {
        let alphas = (0..peer_count).map(|i| field.element(i as u64 + 2)).collect();
        Self { alphas }
    }

    /// The alpha for the given 1-based peer index.
    pub fn alpha(&self, peer_index: usize) -> Option<FieldElement> {
        self.alphas.get(peer_index.checked_sub(1)?).copied()
    }

    /// All alphas, indexed by `peer_index - 1`.
    pub fn alphas(&self) -> &[FieldElement] {
        &self.alphas
    }

    /// The number of privacy peers.
    pub fn peer_count(&self) -> usize {
        self.alphas.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn alphas_are_distinct_nonzero_nonone() {
        let field = Field::new(41).unwrap();
        let mapper = PartyAbscissas::new(&field, 5);
        let mut seen = std::collections::HashSet::new();
        for i in 1..=5 {
            let alpha = mapper.alpha(i).unwrap();
            assert_ne!(alpha.value(), 0);
            assert_ne!(alpha.value(), 1);
            assert!(seen.insert(alpha.value()));
        }
        assert!(mapper.alpha(0).is_none());
        assert!(mapper.alpha(6).is_none());
    }
}
