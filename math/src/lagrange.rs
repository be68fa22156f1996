//! Lagrange interpolation at zero, with a per-support-set weight cache.
//!
//! Mirrors the `math_lib::decoders::lagrange` weight-caching approach: computing barycentric
//! weights is `O(n^2)`, but for a fixed *set* of present abscissas the weights never change, so
//! repeated reconstructions over the same availability pattern (the common case when peers are
//! either all up or a fixed subset has crashed) amortize to `O(n)`.

use crate::{
    errors::InterpolationError,
    field::{Field, FieldElement},
    polynomial::{Point, PointSequence},
};
use rustc_hash::FxHashMap;

/// Lagrange weights for a fixed set of abscissas, usable to interpolate at `x = 0`.
#[derive(Debug, Clone)]
pub struct Lagrange {
    abscissas: Vec<FieldElement>,
    coefficients: FxHashMap<u64, FieldElement>,
}

impl Lagrange {
    /// Computes the weights for interpolating at zero over exactly this set of abscissas.
    pub fn new(field: &Field, abscissas: Vec<FieldElement>) -> Result<Self, InterpolationError> {
        let mut coefficients = FxHashMap::default();
        for (i, &xi) in abscissas.iter().enumerate() {
            let mut weight = FieldElement::ONE;
            for (j, &xj) in abscissas.iter().enumerate() {
                if i != j {
                    weight = field.mul(weight, field.sub(xi, xj));
                }
            }
            let weight = field.inv(weight)?;
            // L_i(0) = product_{j != i} (0 - x_j) / (x_i - x_j) = weight * product_{j!=i}(-x_j)
            let mut numerator = FieldElement::ONE;
            for (j, &xj) in abscissas.iter().enumerate() {
                if i != j {
                    numerator = field.mul(numerator, field.neg(xj));
                }
            }
            coefficients.insert(xi.value(), field.mul(weight, numerator));
        }
        Ok(Self { abscissas, coefficients })
    }

    /// The abscissas this weight set was built for.
    pub fn abscissas(&self) -> &[FieldElement] {
        &self.abscissas
    }

    /// Interpolates `f(0)` given one point per abscissa in this weight set.
    pub fn interpolate(&self, field: &Field, sequence: &PointSequence) -> Result<FieldElement, InterpolationError> {
        if sequence.len() != self.abscissas.len() {
            return Err(InterpolationError::MismatchedAbscissas);
        }
        let mut result = FieldElement::ZERO;
        for point in sequence.points() {
            let coefficient =
                self.coefficients.get(&point.x.value()).ok_or(InterpolationError::MismatchedAbscissas)?;
            result = field.add(result, field.mul(*coefficient, point.y));
        }
        Ok(result)
    }

    /// Interpolates one term of the sum, for callers accumulating shares incrementally (e.g. the
    /// scheduler interpolating as inbound shares trickle in rather than all at once).
    pub fn partial_term(&self, field: &Field, point: &Point) -> Result<FieldElement, InterpolationError> {
        let coefficient = self.coefficients.get(&point.x.value()).ok_or(InterpolationError::MismatchedAbscissas)?;
        Ok(field.mul(*coefficient, point.y))
    }
}

/// Interpolates `f(0)` from a set of present points, computing fresh Lagrange weights.
///
/// Convenience wrapper for one-off interpolations where the weight cache in [Lagrange] doesn't
/// pay for itself; callers that reconstruct repeatedly over a stable availability pattern should
/// build a [Lagrange] once and reuse it (that caching lives in `shamir-sharing`'s reconstructor,
/// which is keyed off the boolean availability vector per SPEC_FULL.md §4.B).
pub fn interpolate_at_zero(field: &Field, points: &[Point]) -> Result<FieldElement, InterpolationError> {
    let abscissas = points.iter().map(|p| p.x).collect();
    let lagrange = Lagrange::new(field, abscissas)?;
    let mut sequence = PointSequence::new();
    for &point in points {
        sequence.push(point);
    }
    lagrange.interpolate(field, &sequence)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_a_line() {
        let field = Field::new(41).unwrap();
        // f(x) = 3 + 2x, sampled at x = 1, 2, 3.
        let f = |x: u64| field.add(field.element(3), field.mul(field.element(2), field.element(x)));
        let points =
            vec![Point::new(field.element(1), f(1)), Point::new(field.element(2), f(2)), Point::new(field.element(3), f(3))];
        let secret = interpolate_at_zero(&field, &points).unwrap();
        assert_eq!(secret, field.element(3));
    }

    #[test]
    fn weight_cache_is_reusable_across_secrets() {
        let field = Field::new(67).unwrap();
        let abscissas = vec![field.element(1), field.element(2), field.element(3)];
        let lagrange = Lagrange::new(&field, abscissas.clone()).unwrap();

        for secret_value in [5u64, 10, 60] {
            let secret = field.element(secret_value);
            let f = |x: FieldElement| field.add(secret, field.mul(field.element(4), x));
            let mut sequence = PointSequence::new();
            for &x in &abscissas {
                sequence.push(Point::new(x, f(x)));
            }
            assert_eq!(lagrange.interpolate(&field, &sequence).unwrap(), secret);
        }
    }
}
