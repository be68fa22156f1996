//! Round-synchronous MPC primitives over Shamir secret shares.
//!
//! This crate schedules and drives a batch of primitive operations (reconstruction,
//! multiplication, randomized bit generation, comparisons, and the array/set operations built on
//! top of them) to completion across a fixed set of privacy peers, exchanging one round of
//! [message::PrimitivesMessage] data per step until every operation in the set reports
//! completion.

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
// Unlike `math_lib`/`shamir-sharing`, this crate doesn't deny `clippy::indexing_slicing`: the
// operation catalogue indexes into fixed-shape result vectors (one element per sub-operation) far
// too often for `.first()`/pattern-match ceremony to pay for itself everywhere it'd apply.

pub mod barrier;
pub mod config;
pub mod driver;
pub mod error;
pub mod message;
pub mod operation;
pub mod predicate_cache;
pub mod result;
pub mod scheduler;

pub use config::{EngineConfig, ResolvedConfig};
pub use driver::{DriverError, PrimitivesDriver};
pub use error::{PrimitivesError, ProtocolError};
pub use message::{PrimitivesMessage, PrimitivesTransport};
pub use result::{OperationOutcome, RoundResult};
pub use scheduler::Scheduler;
