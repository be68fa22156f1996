//! Field and interpolation errors.

use thiserror::Error;

/// Errors constructing or using a [crate::field::Field] context.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum FieldError {
    /// The prime was zero or one.
    #[error("prime must be greater than 1")]
    TooSmall,

    /// The value being converted doesn't fit in the field.
    #[error("value {0} is out of range for this field")]
    OutOfRange(u64),
}

/// Division-by-zero during a modular operation.
#[derive(Error, Debug, Eq, PartialEq)]
#[error("division by zero")]
pub struct DivByZero;

/// A modular square root was requested for a non-quadratic-residue.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum SqrtError {
    /// The value has no square root in this field.
    #[error("value is not a quadratic residue")]
    NonQuadraticResidue,

    /// An arithmetic operation underflowed or overflowed while computing the root.
    #[error("arithmetic error computing square root")]
    Arithmetic,
}

impl From<DivByZero> for SqrtError {
    fn from(_: DivByZero) -> Self {
        SqrtError::Arithmetic
    }
}

/// Polynomial evaluation/interpolation errors.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum InterpolationError {
    /// The set of abscissas provided didn't match what the interpolator was built for.
    #[error("mismatched abscissas")]
    MismatchedAbscissas,

    /// Not enough points were provided to interpolate at the required degree.
    #[error("not enough points to interpolate: need at least {needed}, got {got}")]
    NotEnoughPoints {
        /// The number of points needed.
        needed: usize,
        /// The number of points actually provided.
        got: usize,
    },

    /// A division by zero occurred while computing Lagrange weights.
    #[error(transparent)]
    DivByZero(#[from] DivByZero),
}
