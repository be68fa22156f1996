//! Wire-level message shape and the transport seam the driver sends/receives through.
//!
//! The engine defines the message it wants delivered and a trait describing how to deliver it;
//! the actual socket, framing and retry logic live with the collaborator that implements
//! [PrimitivesTransport] (SPEC_FULL.md §1, §6) — out of scope here, same as the teacher's own
//! `PartyMessage` leaves transport to its caller.

use math_lib::field::FieldElement;

/// One round's worth of share data sent to a single peer.
///
/// `operations_data` is the flattened concatenation of every in-flight operation's outbound
/// shares for that peer, in the scheduler's running order — the receiving peer slices it back
/// apart using each operation's own `outbound_share_count()` (SPEC_FULL.md §4.D).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimitivesMessage {
    /// 1-based index of the sending peer.
    pub sender_index: usize,
    /// Flattened per-operation share data, in running order.
    pub operations_data: Vec<FieldElement>,
}

impl PrimitivesMessage {
    /// Builds a message carrying `operations_data` on behalf of `sender_index`.
    pub fn new(sender_index: usize, operations_data: Vec<FieldElement>) -> Self {
        Self { sender_index, operations_data }
    }

    /// A message standing in for a peer the driver believes has crashed: the right length of
    /// zero-valued "shares" so round bookkeeping can proceed as if the peer is merely missing
    /// data, not that the round never happened (SPEC_FULL.md §4.E, §6).
    pub fn dummy(sender_index: usize, len: usize, zero: FieldElement) -> Self {
        Self { sender_index, operations_data: vec![zero; len] }
    }
}

/// Abstracts how the driver exchanges [PrimitivesMessage]s with the other privacy peers.
///
/// A real implementation owns sockets/channels and peer identity resolution; test code
/// implements this as an in-memory loopback (see `tests/` for scenario coverage).
pub trait PrimitivesTransport {
    /// The transport's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `message` to the given 1-based peer index.
    fn send(&self, to_peer_index: usize, message: PrimitivesMessage) -> Result<(), Self::Error>;

    /// Blocks until one message has arrived from any peer this round, returning it.
    ///
    /// Returns `Ok(None)` if the transport has given up waiting on a peer it considers crashed;
    /// the driver then fabricates a dummy message for that peer via [PrimitivesMessage::dummy].
    fn receive(&self) -> Result<Option<PrimitivesMessage>, Self::Error>;

    /// The total number of privacy peers, including this one.
    fn peer_count(&self) -> usize;

    /// This peer's own 1-based index.
    fn my_peer_index(&self) -> usize;
}
