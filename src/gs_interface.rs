// Shared types for the shuffle overlay: ids, wire messages, event logging.

// all numeric ids share one width so simulators can mint them from a single rng
pub type PeerId = u64;

pub type GsTime = u64;

/// Protocol messages exchanged between two nodes during one shuffle.
///
/// A subset carries neighbor identities only. The `sent_to` bookkeeping the
/// sender keeps on its own cache entries never crosses the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Initiator's opening move: up to `l` neighbors, always including the
    /// initiator itself, never including the receiver.
    ShuffleRequest { subset: Vec<PeerId> },
    /// Responder's answer: up to `l` neighbors drawn from its own cache.
    ShuffleReply { subset: Vec<PeerId> },
    /// Responder was itself mid-exchange; the initiator rolls back.
    ShuffleRejected,
}

#[derive(Clone, Debug)]
pub struct MessageEnvelope {
    pub sender: PeerId,
    pub receiver: PeerId,
    pub time: GsTime,
    pub message: Message,
}

// ============================================================================
// Event Logging System
// ============================================================================

/// What one greedy merge pass did with an incoming subset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    /// Entries appended into free cache slots.
    pub appended: usize,
    /// Entries that overwrote a reclaimable (previously disclosed) slot.
    pub replaced: usize,
    /// Entries skipped because the neighbor was already cached or is the
    /// local node itself.
    pub skipped: usize,
    /// Entries lost: cache full and no reclaimable slot left.
    pub dropped: usize,
}

impl MergeOutcome {
    pub fn absorbed(&self) -> usize {
        self.appended + self.replaced
    }
}

/// Events emitted by the shuffle engine for debugging and analysis
#[derive(Debug, Clone)]
pub enum Event {
    /// Initiator sent a request this round.
    ShuffleStarted {
        partner: PeerId,
        subset_len: usize,
        partner_evicted: bool,
    },
    /// Responder replied with its own subset and merged the requester's.
    RequestAnswered {
        requester: PeerId,
        sent_len: usize,
        merge: MergeOutcome,
    },
    /// Responder was busy and sent a rejection instead.
    RequestRefused { requester: PeerId },
    /// Initiator merged the partner's reply; exchange finished.
    ExchangeCompleted { partner: PeerId, merge: MergeOutcome },
    /// Initiator's request was rejected; exchange finished.
    ExchangeRefused {
        partner: PeerId,
        partner_restored: bool,
    },
}

/// Trait for consuming events from the shuffle engine
pub trait EventSink {
    fn log(&mut self, round: GsTime, peer: PeerId, event: Event);
}

/// No-op event sink for production use (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _round: GsTime, _peer: PeerId, _event: Event) {
        // Intentionally empty - compiler should optimize this away
    }
}
