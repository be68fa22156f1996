//! Shamir secret sharing: share generation and crash-tolerant recovery over a fixed set of
//! privacy peers.

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

pub mod errors;
pub mod party;
pub mod share;
pub mod sharer;

pub use party::PartyAbscissas;
pub use share::{PolyDegree, Share};
pub use sharer::ShamirSecretSharer;
