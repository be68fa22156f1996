//! Modular arithmetic over a runtime-configured prime field.
//!
//! Unlike a design where the modulus is baked into a type parameter, `prime_field_size` is a
//! value the engine receives at startup (see `EngineConfig` in the `primitives` crate), so a
//! [Field] is a small context object: construct one from `p` and use its methods on
//! [FieldElement] values. Small primes run entirely on native `u128` arithmetic; primes that
//! don't fit comfortably in 64 bits fall back to [num_bigint] internally, transparently to the
//! caller.

use crate::errors::{DivByZero, FieldError, SqrtError};
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use rand::RngCore;
use std::fmt;

/// The threshold above which [Field] switches its multiply/pow/sqrt paths to [BigUint].
///
/// `u128` intermediate products can represent the square of any `u64`, so this isn't strictly
/// required for correctness at the sizes this engine targets (`prime_field_size` ≤ 2⁶³), but the
/// fallback is kept explicit per the field-arithmetic contract rather than relying on that
/// accident of `u128`'s width.
const NATIVE_LIMIT: u64 = 1 << 63;

/// An element of a prime field, kept in `[0, p)`.
///
/// This type carries no reference to the modulus it belongs to; all arithmetic goes through the
/// owning [Field] context, since the modulus isn't known at compile time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldElement(pub(crate) u64);

impl FieldElement {
    /// The additive identity.
    pub const ZERO: FieldElement = FieldElement(0);

    /// The multiplicative identity.
    pub const ONE: FieldElement = FieldElement(1);

    /// The raw value in `[0, p)`.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.0)
    }
}

/// Modular arithmetic context for a single prime `p`.
///
/// Precomputes the few derived constants every operation needs: the bit length of `p`, and
/// (lazily used) the Tonelli-Shanks decomposition `p - 1 = q * 2^s` for primes `p ≡ 1 (mod 4)`.
#[derive(Clone)]
pub struct Field {
    p: u64,
    p_big: BigUint,
    wide: bool,
    bits: u32,
}

impl Field {
    /// Builds a field context for prime `p`.
    ///
    /// No primality test is performed: per the field-arithmetic contract, a non-prime `p`
    /// produces a context that computes *something* via the modPow-based inverse identity, but
    /// correctness for e.g. [Field::inv] and [Field::sqrt] is only guaranteed for primes.
    pub fn new(p: u64) -> Result<Self, FieldError> {
        if p < 2 {
            return Err(FieldError::TooSmall);
        }
        let bits = u64::BITS - (p - 1).leading_zeros();
        let wide = p >= NATIVE_LIMIT;
        if wide {
            tracing::warn!(prime = p, "prime field size is close to the u64 range, using big-integer fallback");
        }
        Ok(Self { p, p_big: BigUint::from(p), wide, bits: bits.max(1) })
    }

    /// The prime this field operates modulo.
    pub fn prime(&self) -> u64 {
        self.p
    }

    /// `⌈log₂ p⌉`, the number of bits needed to represent any value in `[0, p)`.
    pub fn bit_length(&self) -> u32 {
        self.bits
    }

    /// Builds a field element from a raw value, reducing it modulo `p` if needed.
    pub fn element(&self, value: u64) -> FieldElement {
        FieldElement(value % self.p)
    }

    /// Builds a field element from a signed value, mapping negatives into `[0, p)`.
    pub fn element_from_i64(&self, value: i64) -> FieldElement {
        if value >= 0 {
            self.element(value as u64)
        } else {
            let magnitude = value.unsigned_abs() % self.p;
            if magnitude == 0 { FieldElement::ZERO } else { FieldElement(self.p - magnitude) }
        }
    }

    /// `a + b mod p`.
    pub fn add(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        let sum = a.0 as u128 + b.0 as u128;
        FieldElement((sum % self.p as u128) as u64)
    }

    /// `a - b mod p`.
    pub fn sub(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        if a.0 >= b.0 { FieldElement(a.0 - b.0) } else { FieldElement(self.p - (b.0 - a.0)) }
    }

    /// `-a mod p`.
    pub fn neg(&self, a: FieldElement) -> FieldElement {
        self.sub(FieldElement::ZERO, a)
    }

    /// `a * b mod p`.
    pub fn mul(&self, a: FieldElement, b: FieldElement) -> FieldElement {
        if self.wide {
            let product = (&BigUint::from(a.0)) * BigUint::from(b.0);
            let reduced = product % &self.p_big;
            FieldElement(reduced.to_u64().unwrap_or(0))
        } else {
            let product = a.0 as u128 * b.0 as u128;
            FieldElement((product % self.p as u128) as u64)
        }
    }

    /// Fast modular exponentiation, `base^exponent mod p`, via square-and-multiply.
    pub fn pow(&self, base: FieldElement, exponent: u64) -> FieldElement {
        let mut result = FieldElement::ONE;
        let mut base = base;
        let mut exponent = exponent;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exponent >>= 1;
        }
        result
    }

    /// The multiplicative inverse of `a`, via the group-order modPow identity `a^(p-2)`.
    ///
    /// This identity only holds when `p` is prime; for a non-prime modulus this silently returns
    /// a value that isn't a true inverse rather than erroring, per the field-arithmetic contract.
    pub fn inv(&self, a: FieldElement) -> Result<FieldElement, DivByZero> {
        if a.0 == 0 {
            return Err(DivByZero);
        }
        Ok(self.pow(a, self.p - 2))
    }

    /// `a / b mod p`.
    pub fn div(&self, a: FieldElement, b: FieldElement) -> Result<FieldElement, DivByZero> {
        Ok(self.mul(a, self.inv(b)?))
    }

    /// The Legendre symbol of `a`: `1` if `a` is a nonzero quadratic residue, `-1` if it's a
    /// nonzero non-residue, `0` if `a` is zero.
    pub fn legendre(&self, a: FieldElement) -> i8 {
        if a.0 == 0 {
            return 0;
        }
        let exponent = (self.p - 1) / 2;
        let result = self.pow(a, exponent);
        if result == FieldElement::ONE { 1 } else { -1 }
    }

    /// Modular square root.
    ///
    /// Uses the direct `(p+1)/4` exponent formula when `p ≡ 3 (mod 4)`, and the Tonelli-Shanks
    /// algorithm otherwise. Of the two roots, the numerically smaller representative is
    /// returned, matching the convention used by `generate_random_bit` (§4.C) to pick a
    /// canonical root.
    pub fn sqrt(&self, a: FieldElement) -> Result<FieldElement, SqrtError> {
        if a.0 == 0 {
            return Ok(FieldElement::ZERO);
        }
        if self.legendre(a) != 1 {
            return Err(SqrtError::NonQuadraticResidue);
        }
        let root = if self.p % 4 == 3 { self.sqrt_mod_3(a)? } else { self.sqrt_tonelli_shanks(a)? };
        let other = self.neg(root);
        Ok(std::cmp::min(root, other))
    }

    fn sqrt_mod_3(&self, a: FieldElement) -> Result<FieldElement, SqrtError> {
        let exponent = (self.p + 1) / 4;
        let r = self.pow(a, exponent);
        if self.mul(r, r) == a { Ok(r) } else { Err(SqrtError::NonQuadraticResidue) }
    }

    fn sqrt_tonelli_shanks(&self, a: FieldElement) -> Result<FieldElement, SqrtError> {
        // Factor p - 1 = q * 2^s with q odd.
        let mut q = self.p - 1;
        let mut s = 0u32;
        while q % 2 == 0 {
            q /= 2;
            s += 1;
        }

        // Find a quadratic non-residue z.
        let mut z = 2u64;
        while self.legendre(self.element(z)) != -1 {
            z += 1;
            if z >= self.p {
                return Err(SqrtError::Arithmetic);
            }
        }

        let mut m = s;
        let mut c = self.pow(self.element(z), q);
        let mut t = self.pow(a, q);
        let mut r = self.pow(a, (q + 1) / 2);

        loop {
            if t == FieldElement::ZERO {
                return Err(SqrtError::NonQuadraticResidue);
            }
            if t == FieldElement::ONE {
                return Ok(r);
            }
            let mut i = 0u32;
            let mut tt = t;
            while tt != FieldElement::ONE {
                tt = self.mul(tt, tt);
                i += 1;
                if i >= m {
                    return Err(SqrtError::NonQuadraticResidue);
                }
            }
            let power = m.checked_sub(i + 1).ok_or(SqrtError::Arithmetic)?;
            let mut b = c;
            for _ in 0..power {
                b = self.mul(b, b);
            }
            m = i;
            r = self.mul(r, b);
            c = self.mul(b, b);
            t = self.mul(t, c);
        }
    }

    /// Big-endian bit decomposition of a public value, `⌈log₂ p⌉` bits wide.
    pub fn bit_decompose(&self, value: u64) -> Vec<u8> {
        let mut bits = Vec::with_capacity(self.bits as usize);
        for i in (0..self.bits).rev() {
            bits.push(((value >> i) & 1) as u8);
        }
        bits
    }

    /// Recomposes a big-endian bit vector (as produced by [Field::bit_decompose] or by a
    /// bitwise-shared random number once reconstructed) into a value in `[0, p)`.
    pub fn bit_compose(&self, bits: &[u8]) -> FieldElement {
        let mut value = 0u64;
        for &bit in bits {
            value = (value << 1) | (bit as u64 & 1);
        }
        self.element(value)
    }

    /// Samples a uniformly random field element using the given RNG.
    ///
    /// Cryptographic strength is whatever the passed-in RNG provides; this engine doesn't
    /// impose a particular algorithm, see `random_algorithm` in `EngineConfig` and the open
    /// question in SPEC_FULL.md §9.
    pub fn random_element<R: RngCore>(&self, rng: &mut R) -> FieldElement {
        // Rejection sampling to avoid modulo bias.
        let limit = u64::MAX - (u64::MAX % self.p);
        loop {
            let candidate = rng.next_u64();
            if candidate < limit {
                return FieldElement(candidate % self.p);
            }
        }
    }

    /// Whether `a` is numerically smaller than `p / 2`. Used by `[x < p/2]` predicates (§4.C
    /// LessThan) on *public* values; for secret-shared values this predicate is computed via
    /// `Lsb`/`BitwiseLessThan` instead.
    pub fn is_lower_half(&self, a: FieldElement) -> bool {
        a.0 < self.p / 2
    }
}

impl One for FieldElement {
    fn one() -> Self {
        FieldElement::ONE
    }
}

impl Zero for FieldElement {
    fn zero() -> Self {
        FieldElement::ZERO
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(13)]
    #[case(41)]
    #[case(2147483647)]
    fn add_sub_roundtrip(#[case] p: u64) {
        let field = Field::new(p).unwrap();
        let a = field.element(5);
        let b = field.element(9);
        let sum = field.add(a, b);
        assert_eq!(field.sub(sum, b), a);
    }

    #[test]
    fn inverse_identity() {
        let field = Field::new(41).unwrap();
        for v in 1..41 {
            let a = field.element(v);
            let inv = field.inv(a).unwrap();
            assert_eq!(field.mul(a, inv), FieldElement::ONE);
        }
    }

    #[test]
    fn sqrt_p_mod_3() {
        // 7 mod 4 == 3.
        let field = Field::new(7).unwrap();
        let four = field.element(4);
        let root = field.sqrt(four).unwrap();
        assert_eq!(field.mul(root, root), four);
        assert!(root.value() <= field.prime() - root.value());
    }

    #[test]
    fn sqrt_p_mod_1() {
        // 41 mod 4 == 1.
        let field = Field::new(41).unwrap();
        for v in 1..41u64 {
            let a = field.element(v);
            if field.legendre(a) == 1 {
                let root = field.sqrt(a).unwrap();
                assert_eq!(field.mul(root, root), a);
            }
        }
    }

    #[test]
    fn bit_decompose_roundtrip() {
        let field = Field::new(41).unwrap();
        assert_eq!(field.bit_length(), 6);
        let bits = field.bit_decompose(37);
        assert_eq!(field.bit_compose(&bits), field.element(37));
    }

    #[test]
    fn legendre_symbol() {
        let field = Field::new(41).unwrap();
        assert_eq!(field.legendre(FieldElement::ZERO), 0);
        // 4 is a quadratic residue mod 41 (2^2).
        assert_eq!(field.legendre(field.element(4)), 1);
    }

    #[test]
    fn wide_prime_uses_bignum_path() {
        let field = Field::new(u64::MAX - 58).unwrap();
        let a = field.element(u64::MAX - 100);
        let b = field.element(12345);
        let product = field.mul(a, b);
        let recovered = field.div(product, b).unwrap();
        assert_eq!(recovered, a);
    }
}
