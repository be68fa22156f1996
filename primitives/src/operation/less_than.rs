//! LessThan: a shared `a < b` bit for two arbitrary shared values (Nishide-Ohta comparison).
//!
//! Built from three half-interval predicates: `w = [a < p/2]`, `x = [b < p/2]`,
//! `y = [a-b < p/2]`, each either supplied by the caller (when already known, e.g. a public
//! operand) or computed via [Lsb] of `2·value` (`[v < p/2]` is the complement of the LSB of
//! `2v mod p`, since `p` is odd: doubling a value below `p/2` stays even and under `p`, while
//! doubling one at or above it wraps past `p` into an odd remainder). The three are combined as
//! `w·(x+y−2xy) + 1−x−y+xy`, which needs two further [Multiplication]s (SPEC_FULL.md §4.C).
//!
//! Each predicate may be cached under a caller-supplied key in
//! [crate::predicate_cache::PredicateCache] so repeat comparisons against the same operand (e.g.
//! the same public threshold checked against every slot of a filter) skip recomputing it.

use super::lsb::Lsb;
use super::multiplication::Multiplication;
use super::{single_value, OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::{Field, FieldElement};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// What a caller already knows (or wants cached) about one of [LessThan]'s three internal
/// `[· < p/2]` half-interval predicates.
#[derive(Clone, Copy, Default)]
pub struct PredicateHint {
    known: Option<bool>,
    cache_key: Option<u64>,
}

impl PredicateHint {
    /// A predicate the caller already knows the value of — typically because the operand is a
    /// public constant, whose half-interval membership can be checked locally with no round.
    pub fn known(value: bool) -> Self {
        Self { known: Some(value), cache_key: None }
    }

    /// A predicate to compute via [Lsb], reused from (and saved to)
    /// [crate::predicate_cache::PredicateCache] under `cache_key`. Pass the same key across calls
    /// that compare the same underlying operand.
    pub fn cached(cache_key: u64) -> Self {
        Self { known: None, cache_key: Some(cache_key) }
    }

    /// A predicate to compute via [Lsb] fresh every time, with no caching.
    pub fn unknown() -> Self {
        Self::default()
    }
}

enum Predicate {
    Resolved(FieldElement),
    Pending { cache_key: Option<u64>, lsb: Lsb },
}

impl Predicate {
    fn new(id: u64, hint: PredicateHint, share: FieldElement, bit_length: u32, field: &Field, rng: ChaCha20Rng) -> Self {
        match hint.known {
            Some(value) => Predicate::Resolved(if value { FieldElement::ONE } else { FieldElement::ZERO }),
            None => {
                let doubled = field.add(share, share);
                Predicate::Pending { cache_key: hint.cache_key, lsb: Lsb::new(id, doubled, bit_length, rng) }
            }
        }
    }

    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match self {
            Predicate::Resolved(_) => 0,
            Predicate::Pending { lsb, .. } => lsb.outbound_share_count(peer_index),
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        if let Predicate::Pending { lsb, .. } = self {
            lsb.copy_outbound_shares(peer_index, buf);
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match self {
            Predicate::Pending { lsb, .. } => lsb.copy_inbound_shares(peer_index, data),
            Predicate::Resolved(_) => Ok(0),
        }
    }

    /// Advances this predicate by one round. Checked against the cache first, every call, so a
    /// concurrent comparison over the same key finishing first lets this one short-circuit too.
    fn do_step(&mut self, ctx: &OperationContext, id: u64) -> Result<(), PrimitivesError> {
        let Predicate::Pending { cache_key, lsb } = self else { return Ok(()) };
        if let Some(key) = *cache_key {
            if let Some(cached) = ctx.predicate_cache.get(key) {
                *self = Predicate::Resolved(cached);
                return Ok(());
            }
        }
        lsb.do_step(ctx)?;
        if !lsb.is_complete() {
            return Ok(());
        }
        let bit = single_value(lsb.final_result()?, id)?;
        let field = ctx.sharer.field();
        let half = field.sub(FieldElement::ONE, bit);
        if let Some(key) = *cache_key {
            ctx.predicate_cache.insert(key, half);
        }
        *self = Predicate::Resolved(half);
        Ok(())
    }

    fn value(&self) -> Option<FieldElement> {
        match self {
            Predicate::Resolved(value) => Some(*value),
            Predicate::Pending { .. } => None,
        }
    }
}

enum Stage {
    Predicates { w: Predicate, x: Predicate, y: Predicate },
    MultiplyXy { w: FieldElement, x: FieldElement, y: FieldElement, mult: Multiplication },
    MultiplyWTerm { x: FieldElement, y: FieldElement, xy: FieldElement, mult: Multiplication },
    Done(OperationOutcome),
}

/// A single LessThan operation instance.
pub struct LessThan {
    id: u64,
    stage: Stage,
    rng: ChaCha20Rng,
}

impl LessThan {
    /// Builds a LessThan operation testing `a_share < b_share`.
    ///
    /// `a_hint`/`b_hint`/`diff_hint` let the caller short-circuit or cache any of the three
    /// internal half-interval predicates ([PredicateHint]); pass [PredicateHint::unknown] when
    /// none applies.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        a_share: FieldElement,
        b_share: FieldElement,
        a_hint: PredicateHint,
        b_hint: PredicateHint,
        diff_hint: PredicateHint,
        field: &Field,
        bit_length: u32,
        mut rng: ChaCha20Rng,
    ) -> Self {
        let diff_share = field.sub(a_share, b_share);
        let w_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
        let x_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
        let y_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
        let w = Predicate::new(id, a_hint, a_share, bit_length, field, w_rng);
        let x = Predicate::new(id.wrapping_add(1), b_hint, b_share, bit_length, field, x_rng);
        let y = Predicate::new(id.wrapping_add(2), diff_hint, diff_share, bit_length, field, y_rng);
        Self { id, stage: Stage::Predicates { w, x, y }, rng }
    }
}

impl PrimitiveOperation for LessThan {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::Predicates { w, x, y } => {
                w.outbound_share_count(peer_index) + x.outbound_share_count(peer_index) + y.outbound_share_count(peer_index)
            }
            Stage::MultiplyXy { mult, .. } | Stage::MultiplyWTerm { mult, .. } => mult.outbound_share_count(peer_index),
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::Predicates { w, x, y } => {
                w.copy_outbound_shares(peer_index, buf);
                x.copy_outbound_shares(peer_index, buf);
                y.copy_outbound_shares(peer_index, buf);
            }
            Stage::MultiplyXy { mult, .. } | Stage::MultiplyWTerm { mult, .. } => mult.copy_outbound_shares(peer_index, buf),
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::Predicates { w, x, y } => {
                let mut consumed = 0;
                consumed += w.copy_inbound_shares(peer_index, &data[consumed..])?;
                consumed += x.copy_inbound_shares(peer_index, &data[consumed..])?;
                consumed += y.copy_inbound_shares(peer_index, &data[consumed..])?;
                Ok(consumed)
            }
            Stage::MultiplyXy { mult, .. } | Stage::MultiplyWTerm { mult, .. } => mult.copy_inbound_shares(peer_index, data),
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        loop {
            match &mut self.stage {
                Stage::Predicates { w, x, y } => {
                    w.do_step(ctx, self.id)?;
                    x.do_step(ctx, self.id)?;
                    y.do_step(ctx, self.id)?;
                    let (Some(w_v), Some(x_v), Some(y_v)) = (w.value(), x.value(), y.value()) else {
                        return Ok(());
                    };
                    let rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                    self.stage = Stage::MultiplyXy { w: w_v, x: x_v, y: y_v, mult: Multiplication::new(self.id, x_v, y_v, rng) };
                }
                Stage::MultiplyXy { w, x, y, mult } => {
                    mult.do_step(ctx)?;
                    if !mult.is_complete() {
                        return Ok(());
                    }
                    let OperationOutcome::Success(values) = mult.final_result()? else {
                        self.stage = Stage::Done(OperationOutcome::Failure);
                        return Ok(());
                    };
                    let xy = values[0];
                    let field = ctx.sharer.field();
                    let two_xy = field.add(xy, xy);
                    let term = field.sub(field.add(*x, *y), two_xy);
                    let (w, x, y) = (*w, *x, *y);
                    let rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                    self.stage = Stage::MultiplyWTerm { x, y, xy, mult: Multiplication::new(self.id, w, term, rng) };
                }
                Stage::MultiplyWTerm { x, y, xy, mult } => {
                    mult.do_step(ctx)?;
                    if !mult.is_complete() {
                        return Ok(());
                    }
                    let OperationOutcome::Success(values) = mult.final_result()? else {
                        self.stage = Stage::Done(OperationOutcome::Failure);
                        return Ok(());
                    };
                    let w_term = values[0];
                    let field = ctx.sharer.field();
                    // result = w*term + 1 - x - y + xy
                    let result = field.add(field.add(w_term, FieldElement::ONE), field.sub(*xy, field.add(*x, *y)));
                    self.stage = Stage::Done(OperationOutcome::Success(vec![result]));
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
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "less-than not complete" }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operation::OperationContext;
    use crate::predicate_cache::PredicateCache;
    use rand::{rngs::StdRng, SeedableRng};
    use shamir_sharing::share::PolyDegree;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    fn setup(peer_count: usize, degree: u64) -> (Arc<Field>, Vec<OperationContext>) {
        let field = Arc::new(Field::new(2_147_483_647).unwrap());
        let ctxs = (0..peer_count)
            .map(|_| OperationContext {
                sharer: Arc::new(ShamirSecretSharer::new(field.clone(), degree, peer_count as u64, 1).unwrap()),
                predicate_cache: Arc::new(PredicateCache::new()),
                synchronize_shares: false,
            })
            .collect();
        (field, ctxs)
    }

    fn run(field: &Field, ctxs: &[OperationContext], mut ops: Vec<LessThan>) -> FieldElement {
        for _ in 0..200 {
            if ops.iter().all(LessThan::is_complete) {
                break;
            }
            for (op, ctx) in ops.iter_mut().zip(ctxs) {
                op.do_step(ctx).unwrap();
            }
            for sender in 0..ops.len() {
                for recipient in 0..ops.len() {
                    if sender == recipient {
                        continue;
                    }
                    let mut buf = Vec::new();
                    ops[sender].copy_outbound_shares(recipient + 1, &mut buf);
                    if !buf.is_empty() {
                        ops[recipient].copy_inbound_shares(sender + 1, &buf).unwrap();
                    }
                }
            }
        }
        assert!(ops.iter().all(LessThan::is_complete), "less-than never finished");
        let shares: Vec<_> = ops.iter().map(|op| single_value(op.final_result().unwrap(), 0).unwrap()).collect();
        ctxs[0].sharer.recover(&shares.into_iter().map(Some).collect::<Vec<_>>(), PolyDegree::T).unwrap()
    }

    fn compare(a: u64, b: u64) -> FieldElement {
        let (field, ctxs) = setup(5, 2);
        let mut rng = StdRng::seed_from_u64(a.wrapping_add(b));
        let a_val = field.element(a);
        let b_val = field.element(b);
        let a_shares = ctxs[0].sharer.generate_shares(a_val, PolyDegree::T, &mut rng);
        let b_shares = ctxs[0].sharer.generate_shares(b_val, PolyDegree::T, &mut rng);
        let ops: Vec<LessThan> = (0..5)
            .map(|i| {
                LessThan::new(
                    i as u64,
                    a_shares[i],
                    b_shares[i],
                    PredicateHint::unknown(),
                    PredicateHint::unknown(),
                    PredicateHint::unknown(),
                    &field,
                    32,
                    ChaCha20Rng::seed_from_u64(i as u64),
                )
            })
            .collect();
        run(&field, &ctxs, ops)
    }

    #[test]
    fn small_operands_below_half_compare_correctly() {
        assert_eq!(compare(10, 20), FieldElement::ONE);
        assert_eq!(compare(20, 10), FieldElement::ZERO);
        assert_eq!(compare(10, 10), FieldElement::ZERO);
    }

    /// The old single-predicate construction only handled operands far below `p/2`; operands
    /// actually near or above half the field's range are exactly where the three-predicate
    /// construction's extra bookkeeping pays for itself.
    #[test]
    fn operands_above_half_the_field_compare_correctly() {
        let half = 2_147_483_647 / 2;
        assert_eq!(compare(half + 100, half + 200), FieldElement::ONE);
        assert_eq!(compare(half + 200, half + 100), FieldElement::ZERO);
        assert_eq!(compare(half - 5, half + 5), FieldElement::ONE);
        assert_eq!(compare(half + 5, half - 5), FieldElement::ZERO);
    }

    #[test]
    fn known_public_operand_skips_its_own_predicate_round() {
        let (field, ctxs) = setup(5, 2);
        let mut rng = StdRng::seed_from_u64(7);
        let threshold = field.element(1_000);
        let weighted_sum = field.element(500);
        let known_b_half = field.is_lower_half(threshold);
        let shares = ctxs[0].sharer.generate_shares(weighted_sum, PolyDegree::T, &mut rng);
        let ops: Vec<LessThan> = (0..5)
            .map(|i| {
                LessThan::new(
                    i as u64,
                    shares[i],
                    threshold,
                    PredicateHint::unknown(),
                    PredicateHint::known(known_b_half),
                    PredicateHint::unknown(),
                    &field,
                    32,
                    ChaCha20Rng::seed_from_u64(i as u64),
                )
            })
            .collect();
        let result = run(&field, &ctxs, ops);
        assert_eq!(result, FieldElement::ONE); // 500 < 1000
    }

    #[test]
    fn cached_predicate_is_reused_across_comparisons() {
        let (field, ctxs) = setup(5, 2);
        let mut rng = StdRng::seed_from_u64(11);
        let a = field.element(42);
        let b = field.element(100);
        let c = field.element(10);
        let a_shares = ctxs[0].sharer.generate_shares(a, PolyDegree::T, &mut rng);
        let b_shares = ctxs[0].sharer.generate_shares(b, PolyDegree::T, &mut rng);
        let c_shares = ctxs[0].sharer.generate_shares(c, PolyDegree::T, &mut rng);
        let a_key = 555;

        let first: Vec<LessThan> = (0..5)
            .map(|i| {
                LessThan::new(
                    i as u64,
                    a_shares[i],
                    b_shares[i],
                    PredicateHint::cached(a_key),
                    PredicateHint::unknown(),
                    PredicateHint::unknown(),
                    &field,
                    32,
                    ChaCha20Rng::seed_from_u64(i as u64),
                )
            })
            .collect();
        assert_eq!(run(&field, &ctxs, first), FieldElement::ONE); // 42 < 100
        assert!(ctxs.iter().all(|ctx| ctx.predicate_cache.get(a_key).is_some()));

        let second: Vec<LessThan> = (0..5)
            .map(|i| {
                LessThan::new(
                    100 + i as u64,
                    a_shares[i],
                    c_shares[i],
                    PredicateHint::cached(a_key),
                    PredicateHint::unknown(),
                    PredicateHint::unknown(),
                    &field,
                    32,
                    ChaCha20Rng::seed_from_u64(100 + i as u64),
                )
            })
            .collect();
        assert_eq!(run(&field, &ctxs, second), FieldElement::ZERO); // 42 < 10 is false
    }
}
