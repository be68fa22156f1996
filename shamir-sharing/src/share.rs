//! The share type and the `MISSING_SHARE` sentinel.

use math_lib::field::FieldElement;

/// A single privacy peer's share of a secret.
///
/// `None` is this crate's `MISSING_SHARE` sentinel (SPEC_FULL.md §3): a peer that crashed before
/// delivering its share for a round. Rust's `Option` replaces the out-of-band numeric marker the
/// original design used, per the `null`-message redesign note in SPEC_FULL.md §9 — the same
/// substitution applied one layer up, to primitives messages.
pub type Share = Option<FieldElement>;

/// The degree a share vector is expected to be interpolatable at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyDegree {
    /// Degree `t`, needing `t + 1` present shares.
    T,
    /// Degree `2t`, needing `2t + 1` present shares, used when recovering a multiplication's
    /// intermediate (pre-resharing) product.
    TwoT,
}
