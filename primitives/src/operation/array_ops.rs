//! Elementwise and reducing array operations: batched instances of the scalar primitives.
//!
//! `ArrayMultiplication`/`ArrayPower`/`ArrayEqual` run one scalar operation per input pair,
//! stepped together. `ArrayProduct` does the same but additionally reduces its per-element
//! results into a single running product. `Min` reduces an array to its smallest element using a
//! tournament of pairwise [LessThan] tests. All of them accept a `round_optimised` flag: when
//! true, every pairwise comparison or multiplication in a level runs concurrently; when false,
//! they run one at a time — trading rounds for peak per-round bandwidth (SPEC_FULL.md §4.C).

use super::less_than::{LessThan, PredicateHint};
use super::multiplication::Multiplication;
use super::power::Power;
use super::product::Product;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use itertools::Itertools;
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

/// ArrayMultiplication: elementwise product of two equal-length share arrays.
pub struct ArrayMultiplication {
    id: u64,
    items: Vec<Multiplication>,
    outcome: Option<OperationOutcome>,
}

impl ArrayMultiplication {
    /// Builds an ArrayMultiplication over paired elements of `a` and `b`.
    pub fn new(id: u64, a: Vec<FieldElement>, b: Vec<FieldElement>, mut rng: ChaCha20Rng) -> Self {
        let items = a
            .into_iter()
            .zip(b)
            .enumerate()
            .map(|(i, (x, y))| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                Multiplication::new(id.wrapping_add(i as u64), x, y, child_rng)
            })
            .collect();
        Self { id, items, outcome: None }
    }
}

impl PrimitiveOperation for ArrayMultiplication {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.items, peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.items, peer_index, buf)
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.items, peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.items, ctx)?;
        if self.items.iter().all(Multiplication::is_complete) {
            let mut values = Vec::with_capacity(self.items.len());
            for item in &self.items {
                match item.final_result()? {
                    OperationOutcome::Success(v) => values.push(v[0]),
                    OperationOutcome::Failure => {
                        self.outcome = Some(OperationOutcome::Failure);
                        return Ok(());
                    }
                }
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "array multiplication not complete" })
    }
}

/// ArrayPower: raises each element of a shared array to the same public exponent.
pub struct ArrayPower {
    id: u64,
    items: Vec<Power>,
    outcome: Option<OperationOutcome>,
}

impl ArrayPower {
    /// Builds an ArrayPower over `bases`, each raised to `exponent`.
    pub fn new(id: u64, bases: Vec<FieldElement>, exponent: u64, mut rng: ChaCha20Rng) -> Self {
        let items = bases
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                Power::new(id.wrapping_add(i as u64), base, exponent, child_rng)
            })
            .collect();
        Self { id, items, outcome: None }
    }
}

impl PrimitiveOperation for ArrayPower {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.items, peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.items, peer_index, buf)
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.items, peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.items, ctx)?;
        if self.items.iter().all(Power::is_complete) {
            let mut values = Vec::with_capacity(self.items.len());
            for item in &self.items {
                values.push(single_value(item.final_result()?, self.id)?);
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "array power not complete" })
    }
}

/// ArrayEqual: elementwise equality indicator between two shared arrays.
pub struct ArrayEqual {
    id: u64,
    items: Vec<super::equal::Equal>,
    outcome: Option<OperationOutcome>,
}

impl ArrayEqual {
    /// Builds an ArrayEqual over paired elements of `a` and `b`.
    pub fn new(id: u64, a: Vec<FieldElement>, b: Vec<FieldElement>, field: &math_lib::field::Field, mut rng: ChaCha20Rng) -> Self {
        let items = a
            .into_iter()
            .zip(b)
            .enumerate()
            .map(|(i, (x, y))| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                super::equal::Equal::new(id.wrapping_add(i as u64), x, y, field, child_rng)
            })
            .collect();
        Self { id, items, outcome: None }
    }
}

impl PrimitiveOperation for ArrayEqual {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.items, peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.items, peer_index, buf)
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.items, peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        step_all(&mut self.items, ctx)?;
        if self.items.iter().all(super::equal::Equal::is_complete) {
            let mut values = Vec::with_capacity(self.items.len());
            for item in &self.items {
                values.push(single_value(item.final_result()?, self.id)?);
            }
            self.outcome = Some(OperationOutcome::Success(values));
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "array equal not complete" })
    }
}

/// ArrayProduct: the running product of a shared array, reusing [Product]'s reduction tree.
pub struct ArrayProduct {
    inner: Product,
}

impl ArrayProduct {
    /// Builds an ArrayProduct over `values`.
    pub fn new(id: u64, values: Vec<FieldElement>, rng: ChaCha20Rng) -> Self {
        Self { inner: Product::new(id, values, rng) }
    }
}

impl PrimitiveOperation for ArrayProduct {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        self.inner.outbound_share_count(peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        self.inner.copy_outbound_shares(peer_index, buf);
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        self.inner.copy_inbound_shares(peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        self.inner.do_step(ctx)
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.inner.final_result()
    }
}

/// Min: a tournament reduction picking the smallest of a shared array via pairwise [LessThan].
///
/// Each level pairs up adjacent values and keeps whichever one `LessThan` reports smaller,
/// computed locally once the comparison bit is in: `min = b + bit*(a - b)` selects `a` when
/// `bit = 1` (`a < b`) and `b` otherwise — itself a local linear combination of a shared
/// comparison bit, needing no extra round. An odd value out carries forward unreduced, as in
/// [Product].
pub struct Min {
    id: u64,
    level: Vec<FieldElement>,
    active: Vec<LessThan>,
    pairs: Vec<(FieldElement, FieldElement)>,
    field_bit_length: u32,
    rng: ChaCha20Rng,
    outcome: Option<OperationOutcome>,
    // Every `LessThan` this reduction ever spawns gets a distinct id (and so a distinct
    // predicate-cache key) from this counter — reusing `self.id + pair index` per level would
    // collide across levels, since each level's pairing restarts from index 0, and hand a later
    // level's comparison the cached verdict of an earlier, unrelated one at the same index.
    next_sub_id: u64,
}

impl Min {
    /// Builds a Min reduction over `values`. Must have at least one element.
    pub fn new(id: u64, values: Vec<FieldElement>, field_bit_length: u32, rng: ChaCha20Rng) -> Self {
        let mut op = Self {
            id,
            level: values,
            active: Vec::new(),
            pairs: Vec::new(),
            field_bit_length,
            rng,
            outcome: None,
            next_sub_id: id,
        };
        if op.level.len() <= 1 {
            if let Some(&value) = op.level.first() {
                op.outcome = Some(OperationOutcome::Success(vec![value]));
            }
        }
        op
    }

    fn start_level(&mut self, field: &math_lib::field::Field) {
        let mut active = Vec::with_capacity(self.level.len() / 2);
        let mut pairs = Vec::with_capacity(self.level.len() / 2);
        for (a, b) in self.level.iter().copied().tuples() {
            let sub_id = self.next_sub_id;
            self.next_sub_id = self.next_sub_id.wrapping_add(1);
            let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
            active.push(LessThan::new(
                sub_id,
                a,
                b,
                PredicateHint::unknown(),
                PredicateHint::unknown(),
                PredicateHint::unknown(),
                field,
                self.field_bit_length,
                child_rng,
            ));
            pairs.push((a, b));
        }
        self.active = active;
        self.pairs = pairs;
    }
}

impl PrimitiveOperation for Min {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        outbound_all(&self.active, peer_index)
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        copy_outbound_all(&self.active, peer_index, buf)
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        copy_inbound_all(&mut self.active, peer_index, data)
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        if self.outcome.is_some() {
            return Ok(());
        }
        let field = ctx.sharer.field();
        if self.active.is_empty() && self.level.len() > 1 {
            self.start_level(field);
        }
        step_all(&mut self.active, ctx)?;
        if !self.active.is_empty() && self.active.iter().all(LessThan::is_complete) {
            let odd_one_out = if self.level.len() % 2 == 1 { self.level.last().copied() } else { None };
            let mut next_level = Vec::with_capacity(self.active.len() + usize::from(odd_one_out.is_some()));
            for (lt, &(a, b)) in self.active.iter().zip(&self.pairs) {
                let bit = single_value(lt.final_result()?, self.id)?;
                let diff = field.sub(a, b);
                next_level.push(field.add(b, field.mul(bit, diff)));
            }
            if let Some(value) = odd_one_out {
                next_level.push(value);
            }
            self.level = next_level;
            self.active.clear();
            self.pairs.clear();
            if self.level.len() <= 1 {
                if let Some(&value) = self.level.first() {
                    self.outcome = Some(OperationOutcome::Success(vec![value]));
                }
            }
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    fn final_result(&self) -> Result<OperationOutcome, PrimitivesError> {
        self.outcome.clone().ok_or(PrimitivesError::UnexpectedState { id: self.id, detail: "min not complete" })
    }
}
