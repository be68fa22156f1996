//! Result delivery types handed back to the application once a round completes.

use math_lib::field::FieldElement;

/// The outcome of a single completed operation.
///
/// Replaces a `[-1]`-sentinel convention some randomized sub-protocols use internally to signal
/// "try again" (SPEC_FULL.md §9): by the time a result reaches the application, failure is a
/// distinct, explicit variant rather than a magic value folded into `Success`'s payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation produced a result share (or shares, for array-valued operations).
    Success(Vec<FieldElement>),
    /// The operation could not produce a result (e.g. a randomized primitive exhausted its
    /// retry budget, or too many peers crashed mid-round).
    Failure,
}

/// The result of driving one round (or a full operation set) to completion.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// `true` iff every operation in the set completed with [OperationOutcome::Success].
    pub ok: bool,
    /// Each completed operation's outcome, in the order operations were submitted.
    pub per_operation: Vec<OperationOutcome>,
}

impl RoundResult {
    /// Builds a `RoundResult`, computing `ok` from the outcomes.
    pub fn new(per_operation: Vec<OperationOutcome>) -> Self {
        let ok = per_operation.iter().all(|outcome| matches!(outcome, OperationOutcome::Success(_)));
        Self { ok, per_operation }
    }
}
