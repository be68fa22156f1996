//! BitwiseLessThan: a shared `a < b` bit from two shared bit arrays, MSB first (Nishide-Ohta).
//!
//! 1. `d_i = a_i XOR b_i = a_i + b_i - 2 a_i b_i`, one [Multiplication] per bit for the `a_i b_i`
//!    term.
//! 2. `e = PrefixOr(d)` locates the most significant differing bit.
//! 3. `f_i = e_i - e_{i-1}` (with `e_{-1} = 0`) isolates exactly that bit.
//! 4. `result = sum_i f_i * b_i`, one [Multiplication] per bit, summed locally — `a < b` iff the
//!    first differing bit (from the top) is set in `b` but not `a`.

use super::multiplication::Multiplication;
use super::prefix_or::PrefixOr;
use super::{OperationContext, PrimitiveOperation};
use crate::error::PrimitivesError;
use crate::result::OperationOutcome;
use math_lib::field::FieldElement;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

enum Stage {
    Xor { products: Vec<Multiplication>, a_bits: Vec<FieldElement>, b_bits: Vec<FieldElement> },
    Prefix { prefix_or: PrefixOr, b_bits: Vec<FieldElement> },
    Weighting { products: Vec<Multiplication> },
    Done(OperationOutcome),
}

/// A single BitwiseLessThan operation instance.
pub struct BitwiseLessThan {
    id: u64,
    stage: Stage,
    rng: ChaCha20Rng,
}

impl BitwiseLessThan {
    /// Builds a BitwiseLessThan operation over two equal-length, MSB-first shared bit arrays.
    pub fn new(id: u64, a_bits: Vec<FieldElement>, b_bits: Vec<FieldElement>, mut rng: ChaCha20Rng) -> Self {
        let products = a_bits
            .iter()
            .zip(&b_bits)
            .enumerate()
            .map(|(i, (&a, &b))| {
                let child_rng = ChaCha20Rng::from_rng(&mut rng).unwrap_or_else(|_| rng.clone());
                Multiplication::new(id.wrapping_add(i as u64), a, b, child_rng)
            })
            .collect();
        Self { id, stage: Stage::Xor { products, a_bits, b_bits }, rng }
    }
}

impl PrimitiveOperation for BitwiseLessThan {
    fn outbound_share_count(&self, peer_index: usize) -> usize {
        match &self.stage {
            Stage::Xor { products, .. } => products.iter().map(|m| m.outbound_share_count(peer_index)).sum(),
            Stage::Prefix { prefix_or, .. } => prefix_or.outbound_share_count(peer_index),
            Stage::Weighting { products } => products.iter().map(|m| m.outbound_share_count(peer_index)).sum(),
            Stage::Done(_) => 0,
        }
    }

    fn copy_outbound_shares(&self, peer_index: usize, buf: &mut Vec<FieldElement>) {
        match &self.stage {
            Stage::Xor { products, .. } => products.iter().for_each(|m| m.copy_outbound_shares(peer_index, buf)),
            Stage::Prefix { prefix_or, .. } => prefix_or.copy_outbound_shares(peer_index, buf),
            Stage::Weighting { products } => products.iter().for_each(|m| m.copy_outbound_shares(peer_index, buf)),
            Stage::Done(_) => {}
        }
    }

    fn copy_inbound_shares(&mut self, peer_index: usize, data: &[FieldElement]) -> Result<usize, PrimitivesError> {
        match &mut self.stage {
            Stage::Xor { products, .. } => {
                let mut consumed = 0;
                for m in products.iter_mut() {
                    consumed += m.copy_inbound_shares(peer_index, &data[consumed..])?;
                }
                Ok(consumed)
            }
            Stage::Prefix { prefix_or, .. } => prefix_or.copy_inbound_shares(peer_index, data),
            Stage::Weighting { products } => {
                let mut consumed = 0;
                for m in products.iter_mut() {
                    consumed += m.copy_inbound_shares(peer_index, &data[consumed..])?;
                }
                Ok(consumed)
            }
            Stage::Done(_) => Ok(0),
        }
    }

    fn do_step(&mut self, ctx: &OperationContext) -> Result<(), PrimitivesError> {
        loop {
            match &mut self.stage {
                Stage::Xor { products, .. } => {
                    for m in products.iter_mut() {
                        m.do_step(ctx)?;
                    }
                    if !products.iter().all(Multiplication::is_complete) {
                        return Ok(());
                    }
                    let field = ctx.sharer.field();
                    let Stage::Xor { products, a_bits, b_bits } =
                        std::mem::replace(&mut self.stage, Stage::Done(OperationOutcome::Failure))
                    else {
                        unreachable!()
                    };
                    let mut d_bits = Vec::with_capacity(products.len());
                    for ((m, &a_i), &b_i) in products.iter().zip(&a_bits).zip(&b_bits) {
                        let OperationOutcome::Success(values) = m.final_result()? else {
                            self.stage = Stage::Done(OperationOutcome::Failure);
                            return Ok(());
                        };
                        let ab = values[0];
                        let sum = field.add(a_i, b_i);
                        let two_ab = field.add(ab, ab);
                        d_bits.push(field.sub(sum, two_ab));
                    }
                    let rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                    self.stage = Stage::Prefix { prefix_or: PrefixOr::new(self.id, d_bits, field, rng), b_bits };
                }
                Stage::Prefix { prefix_or, .. } => {
                    prefix_or.do_step(ctx)?;
                    if !prefix_or.is_complete() {
                        return Ok(());
                    }
                    let field = ctx.sharer.field();
                    let Stage::Prefix { prefix_or, b_bits } =
                        std::mem::replace(&mut self.stage, Stage::Done(OperationOutcome::Failure))
                    else {
                        unreachable!()
                    };
                    let OperationOutcome::Success(e) = prefix_or.final_result()? else {
                        self.stage = Stage::Done(OperationOutcome::Failure);
                        return Ok(());
                    };
                    let mut f = Vec::with_capacity(e.len());
                    let mut previous = FieldElement::ZERO;
                    for &e_i in &e {
                        f.push(field.sub(e_i, previous));
                        previous = e_i;
                    }
                    let products = f
                        .iter()
                        .zip(&b_bits)
                        .enumerate()
                        .map(|(i, (&f_i, &b_i))| {
                            let child_rng = ChaCha20Rng::from_rng(&mut self.rng).unwrap_or_else(|_| self.rng.clone());
                            Multiplication::new(self.id.wrapping_add(100 + i as u64), f_i, b_i, child_rng)
                        })
                        .collect();
                    self.stage = Stage::Weighting { products };
                }
                Stage::Weighting { products } => {
                    for m in products.iter_mut() {
                        m.do_step(ctx)?;
                    }
                    if !products.iter().all(Multiplication::is_complete) {
                        return Ok(());
                    }
                    let field = ctx.sharer.field();
                    let mut sum = FieldElement::ZERO;
                    for m in products.iter() {
                        let OperationOutcome::Success(values) = m.final_result()? else {
                            self.stage = Stage::Done(OperationOutcome::Failure);
                            return Ok(());
                        };
                        sum = field.add(sum, values[0]);
                    }
                    self.stage = Stage::Done(OperationOutcome::Success(vec![sum]));
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
            _ => Err(PrimitivesError::UnexpectedState { id: self.id, detail: "bitwise less-than not complete" }),
        }
    }
}
