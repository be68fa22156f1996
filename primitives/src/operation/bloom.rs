//! Bloom filter set operations over shared bit arrays.
//!
//! A shared Bloom filter is simply a `Vec<FieldElement>` of per-slot bit shares; these operations
//! combine several filters slot-by-slot. Non-counting `Union`/`Intersection` are elementwise OR
//! and AND (the latter a share of a public-constant-free elementwise multiply); the threshold
//! variant additionally needs, per slot, a locally-computed weighted sum of how many input
//! filters set that slot, compared against the threshold via [LessThan] with the threshold
//! supplied as a public degree-zero share (SPEC_FULL.md §4.C).

use super::less_than::{LessThan, PredicateHint};
use super::multiplication::Multiplication;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn step_all<T: PrimitiveOperation>(items: &mut [T], ctx: &OperationContext) -> Result<(), PrimitivesError> {
    for item in items.iter_mut().filter(|item| !item.is_complete()) {
        item.do_step(ctx)?;
    }
    Ok(())
}
fn outbound_all<T: PrimitiveOperation>(items: &[T], peer_index: usize) -> usize {
    items.iter().filter(|item| !item.is_complete()).map(|item| item.outbound_share_count(peer_index)).sum()
}
fn copy_outbound_all<T: PrimitiveOperation>(items: &[T], peer_index: usize, buf: &mut Vec<FieldElement>) {
    for item in items.iter().filter(|item| !item.is_complete()) {
        item.copy_outbound_shares(peer_index, buf);
    }
}
fn copy_inbound_all<T: PrimitiveOperation>(
    items: &mut [T],
    peer_index: usize,
    data: &[FieldElement],
) -> Result<usize, PrimitivesError> {
    let mut consumed = 0;
    for item in items.iter_mut().filter(|item| !item.is_complete()) {
        consumed += item.copy_inbound_shares(peer_index, &data[consumed..])?;
    }
    Ok(consumed)
}

/// BloomIntersection: elementwise AND of several shared Bloom filters.
pub struct BloomIntersection {
    id: u64,
    slots: Vec<Multiplication>,
    outcome: Option<OperationOutcome>,
}

impl BloomIntersection {
    /// Builds a BloomIntersection over exactly two filters (apply pairwise for more).
    pub fn new(id: u64, a: Vec<FieldElement>, b: Vec<FieldElement>, mut rng: ChaCha20Rng) -> Self {
        let slots = a
            .into_iter()
            .zip(b)
            .enumerate()
            .map(|(i, (x, y))| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                Multiplication::new(id.wrapping_add(i as u64), x, y, child_rng)
            })
            .collect();
        Self { id, slots, outcome: None }
    }
}

impl PrimitiveOperation for BloomIntersection {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.slots, peer_index)
    }
    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.slots, peer_index, buf)
    }
    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.slots, peer_index, data)
    }
    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.slots, ctx)?;
        if self.slots.iter().all(Multiplication::is_complete) {
            let mut values = Vec::with_capacity(self.slots.len());
            for slot in &self.slots {
                values.push(single_value(slot.final_result()?, self.id)?);
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }
    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }
    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "bloom intersection not complete" })
    }
}

/// BloomUnion: elementwise OR of two shared Bloom filters, `a + b - a*b` per slot.
pub struct BloomUnion {
    id: u64,
    a: Vec<FieldElement>,
    b: Vec<FieldElement>,
    products: Vec<Multiplication>,
    outcome: Option<OperationOutcome>,
}

impl BloomUnion {
    /// Builds a BloomUnion over two filters.
    pub fn new(id: u64, a: Vec<FieldElement>, b: Vec<FieldElement>, mut rng: ChaCha20Rng) -> Self {
        let products = a
            .iter()
            .zip(&b)
            .enumerate()
            .map(|(i, (&x, &y))| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                Multiplication::new(id.wrapping_add(i as u64), x, y, child_rng)
            })
            .collect();
        Self { id, a, b, products, outcome: None }
    }
}

impl PrimitiveOperation for BloomUnion {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.products, peer_index)
    }
    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.products, peer_index, buf)
    }
    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.products, peer_index, data)
    }
    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.products, ctx)?;
        if self.products.iter().all(Multiplication::is_complete) {
            let field = ctx.sharer.field();
            let mut values = Vec::with_capacity(self.products.len());
            for ((product, &a_i), &b_i) in self.products.iter().zip(&self.a).zip(&self.b) {
                let ab = single_value(product.final_result()?, self.id)?;
                values.push(field.sub(field.add(a_i, b_i), ab));
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }
    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }
    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "bloom union not complete" })
    }
}

/// BloomThresholdUnion: sets each slot iff at least `threshold` of the input filters set it.
///
/// Each slot's weighted sum (weight `1` per filter, for the unweighted `ThresholdUnion` variant)
/// is a local linear combination of already-shared filter bits, so it's itself a valid share of
/// the secret sum — no round needed to produce it. Comparing it against the public `threshold`
/// then reuses [LessThan] with the threshold supplied as a degree-zero "share" (the same public
/// value at every peer, which is exactly what a constant's Shamir sharing is).
pub struct BloomThresholdUnion {
    id: u64,
    tests: Vec<LessThan>,
    outcome: Option<OperationOutcome>,
}

impl BloomThresholdUnion {
    /// Builds a BloomThresholdUnion over several filters of equal length, using per-filter
    /// `weights` (pass all-ones for the unweighted `ThresholdUnion` variant).
    pub fn new(
        id: u64,
        filters: &[Vec<FieldElement>],
        weights: &[FieldElement],
        threshold: u64,
        field: &math_lib::field::Field,
        bit_length: u32,
        mut rng: ChaCha20Rng,
    ) -> Self {
        let slot_count = filters.first().map_or(0, Vec::len);
        let threshold_share = field.element(threshold);
        // The threshold is public, so its own half-interval predicate needs no LSB round at all —
        // every slot's comparison reuses the same locally-computed `known_b_half`.
        let known_threshold_half = field.is_lower_half(threshold_share);
        let tests = (0..slot_count)
            .map(|slot| {
                let weighted_sum = filters.iter().zip(weights).fold(FieldElement::ZERO, |acc, (filter, &weight)| {
                    field.add(acc, field.mul(filter.get(slot).copied().unwrap_or(FieldElement::ZERO), weight))
                });
                let slot_id = id.wrapping_add(slot as u64);
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                // `weighted_sum < threshold` is the complement of "at least threshold"; callers
                // read `1 - result` for the actual indicator, kept explicit in `do_step` below.
                LessThan::new(
                    slot_id,
                    weighted_sum,
                    threshold_share,
                    PredicateHint::unknown(),
                    PredicateHint::known(known_threshold_half),
                    PredicateHint::unknown(),
                    field,
                    bit_length,
                    child_rng,
                )
            })
            .collect();
        Self { id, tests, outcome: None }
    }
}

impl PrimitiveOperation for BloomThresholdUnion {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.tests, peer_index)
    }
    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.tests, peer_index, buf)
    }
    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.tests, peer_index, data)
    }
    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.tests, ctx)?;
        if self.tests.iter().all(LessThan::is_complete) {
            let field = ctx.sharer.field();
            let mut values = Vec::with_capacity(self.tests.len());
            for test in &self.tests {
                let below = single_value(test.final_result()?, self.id)?;
                values.push(field.sub(FieldElement::ONE, below));
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }
    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }
    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "bloom threshold union not complete" })
    }
}

/// BloomCardinality: reveals the (approximate, by Bloom-filter construction) element count of a
/// shared filter by locally summing its slot shares and running one [super::reconstruction::Reconstruction].
pub struct BloomCardinality {
    reveal: super::reconstruction::Reconstruction,
}

impl BloomCardinality {
    /// Builds a BloomCardinality operation over a shared filter.
    pub fn new(id: u64, filter_shares: Vec<FieldElement>, field: &math_lib::field::Field, peer_count: usize) -> Self {
        let sum = filter_shares.into_iter().fold(FieldElement::ZERO, |acc, bit| field.add(acc, bit));
        Self { reveal: super::reconstruction::Reconstruction::new(id, sum, shamir_sharing::share::PolyDegree::T, peer_count) }
    }
}

impl PrimitiveOperation for BloomCardinality {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.reveal.outbound_share_count(peer_index)
    }
    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        self.reveal.copy_outbound_shares(peer_index, buf);
    }
    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        self.reveal.copy_inbound_shares(peer_index, data)
    }
    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        self.reveal.do_step(ctx)
    }
    fn is_complete(&self) -> bool {
        self.reveal.is_complete()
    }
    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.reveal.final_result()
    }
}
