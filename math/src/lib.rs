//! Prime-field arithmetic: modular operations, polynomials and Lagrange interpolation.
//!
//! The modulus is a runtime value (`prime_field_size`, chosen when the engine is configured)
//! rather than a compile-time type parameter, so the central type here is [field::Field], a
//! small context object whose methods operate on [field::FieldElement] values.

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

pub mod errors;
pub mod field;
pub mod lagrange;
pub mod polynomial;

pub use field::{Field, FieldElement};
pub use lagrange::Lagrange;
pub use polynomial::{Point, PointSequence, Polynomial};
