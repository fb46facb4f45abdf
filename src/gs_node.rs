// The shuffle engine: initiator and responder paths of the basic shuffling
// protocol, plus the greedy cache merge both sides share.

use rand::Rng;

use crate::gs_cache::{Cache, Entry};
use crate::gs_interface::{
    Event, EventSink, GsTime, MergeOutcome, Message, MessageEnvelope, NoOpSink, PeerId,
};

/// Protocol parameters, fixed at node construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShuffleConfig {
    /// Maximum number of neighbors a node keeps.
    pub cache_size: usize,
    /// Maximum subset length `l` traded in one exchange.
    pub shuffle_length: usize,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            cache_size: 30,
            shuffle_length: 8,
        }
    }
}

/// Per-node exchange state. A node runs at most one outgoing exchange at a
/// time; both flags resolve together when the reply or rejection arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShuffleState {
    awaiting_response: bool,
    removed_partner: bool,
}

impl ShuffleState {
    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn removed_partner(&self) -> bool {
        self.removed_partner
    }

    fn begin(&mut self, removed_partner: bool) {
        self.awaiting_response = true;
        self.removed_partner = removed_partner;
    }

    fn reset(&mut self) {
        self.awaiting_response = false;
        self.removed_partner = false;
    }
}

pub struct GsNode {
    peer_id: PeerId,
    time: GsTime,
    cache: Cache,
    shuffle_length: usize,
    state: ShuffleState,
    event_sink: Box<dyn EventSink>,
}

impl GsNode {
    /// Create a new node with default NoOpSink (zero overhead)
    pub fn new(id: PeerId, time: GsTime, config: ShuffleConfig) -> Self {
        Self::new_with_sink(id, time, config, Box::new(NoOpSink))
    }

    /// Create a new node with a custom event sink for debugging/analysis
    pub fn new_with_sink(
        id: PeerId,
        time: GsTime,
        config: ShuffleConfig,
        event_sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            peer_id: id,
            time,
            cache: Cache::new(config.cache_size),
            // a subset always has room for the sender itself
            shuffle_length: config.shuffle_length.max(1),
            state: ShuffleState::default(),
            event_sink,
        }
    }

    pub fn get_peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn shuffle_state(&self) -> ShuffleState {
        self.state
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.awaiting_response()
    }

    // ========================================================================
    // Bootstrap interface
    // ========================================================================

    /// Seed one neighbor. Refused (false) for self-references, duplicates and
    /// a full cache.
    pub fn add_neighbor(&mut self, peer: PeerId) -> bool {
        if peer == self.peer_id {
            return false;
        }

        self.cache.add(Entry::new(peer))
    }

    pub fn degree(&self) -> usize {
        self.cache.len()
    }

    pub fn neighbor_at(&self, i: usize) -> Option<PeerId> {
        self.cache.neighbor_at(i)
    }

    pub fn contains_neighbor(&self, peer: &PeerId) -> bool {
        self.cache.contains(peer)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.cache.iter().map(|e| e.neighbor())
    }

    // ========================================================================
    // Initiator path
    // ========================================================================

    /// Called once per round. Picks a random partner, discloses up to `l - 1`
    /// neighbors plus this node's own identity, and enters the waiting state
    /// until the partner's reply or rejection arrives.
    pub fn tick<R: Rng>(&mut self, rng: &mut R, responses: &mut Vec<MessageEnvelope>) {
        self.time += 1;

        // one outgoing exchange at a time; nothing to trade from an empty cache
        if self.state.awaiting_response() || self.cache.is_empty() {
            return;
        }

        let q_index = match self.cache.random_index(rng) {
            Some(i) => i,
            None => return,
        };
        let partner = match self.cache.neighbor_at(q_index) {
            Some(p) => p,
            None => return,
        };

        // Speculative eviction: a full cache gives up the partner's slot now,
        // restored only if the exchange is rejected.
        let partner_evicted = self.cache.is_full();
        let companions = if partner_evicted {
            self.cache.remove(&partner);
            self.cache
                .sample_indices(self.shuffle_length - 1, None, rng)
        } else {
            self.cache
                .sample_indices(self.shuffle_length - 1, Some(q_index), rng)
        };

        let mut subset: Vec<PeerId> = Vec::with_capacity(companions.len() + 1);
        for &slot in &companions {
            // remember what went to the partner; these slots become the
            // reclaimable pool when the reply is merged
            self.cache.mark_sent_to(slot, partner);
            if let Some(neighbor) = self.cache.neighbor_at(slot) {
                subset.push(neighbor);
            }
        }
        subset.push(self.peer_id);

        let subset_len = subset.len();
        responses.push(MessageEnvelope {
            sender: self.peer_id,
            receiver: partner,
            time: self.time,
            message: Message::ShuffleRequest { subset },
        });

        self.state.begin(partner_evicted);

        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ShuffleStarted {
                partner,
                subset_len,
                partner_evicted,
            },
        );
    }

    // ========================================================================
    // Message handling
    // ========================================================================

    pub fn handle_message<R: Rng>(
        &mut self,
        msg: &MessageEnvelope,
        rng: &mut R,
        responses: &mut Vec<MessageEnvelope>,
    ) {
        match &msg.message {
            Message::ShuffleRequest { subset } => {
                self.handle_request(msg.sender, subset, rng, responses)
            }
            Message::ShuffleReply { subset } => self.handle_reply(msg.sender, subset),
            Message::ShuffleRejected => self.handle_rejected(msg.sender),
        }
    }

    /// Responder path. A node mid-exchange refuses outright; otherwise it
    /// answers with its own random subset and absorbs the requester's.
    fn handle_request<R: Rng>(
        &mut self,
        requester: PeerId,
        subset: &[PeerId],
        rng: &mut R,
        responses: &mut Vec<MessageEnvelope>,
    ) {
        if self.state.awaiting_response() {
            responses.push(MessageEnvelope {
                sender: self.peer_id,
                receiver: requester,
                time: self.time,
                message: Message::ShuffleRejected,
            });

            self.event_sink
                .log(self.time, self.peer_id, Event::RequestRefused { requester });
            return;
        }

        let picks = self
            .cache
            .sample_indices(self.shuffle_length, None, rng);
        let mut reply_subset: Vec<PeerId> = Vec::with_capacity(picks.len());
        for &slot in &picks {
            self.cache.mark_sent_to(slot, requester);
            if let Some(neighbor) = self.cache.neighbor_at(slot) {
                reply_subset.push(neighbor);
            }
        }

        let sent_len = reply_subset.len();
        responses.push(MessageEnvelope {
            sender: self.peer_id,
            receiver: requester,
            time: self.time,
            message: Message::ShuffleReply {
                subset: reply_subset,
            },
        });

        // the slots just disclosed are the ones worth giving up if full
        let merge = self.merge_subset(subset, picks);

        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::RequestAnswered {
                requester,
                sent_len,
                merge,
            },
        );
    }

    /// Reply path, back at the original initiator. Slots still marked as
    /// disclosed to this partner form the reclaimable pool.
    fn handle_reply(&mut self, partner: PeerId, subset: &[PeerId]) {
        if !self.state.awaiting_response() {
            // nothing in flight; a stray reply must not disturb the cache
            return;
        }

        let reclaimable = self.cache.reclaimable_slots(&partner);
        let merge = self.merge_subset(subset, reclaimable);
        self.state.reset();

        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ExchangeCompleted { partner, merge },
        );
    }

    /// Reject path. Undoes the speculative eviction, if one happened.
    fn handle_rejected(&mut self, partner: PeerId) {
        if !self.state.awaiting_response() {
            return;
        }

        let partner_restored =
            self.state.removed_partner() && self.cache.add(Entry::new(partner));
        self.state.reset();

        self.event_sink.log(
            self.time,
            self.peer_id,
            Event::ExchangeRefused {
                partner,
                partner_restored,
            },
        );
    }

    // ========================================================================
    // Cache merge
    // ========================================================================

    /// Greedy single-pass merge of an incoming subset. Known neighbors and
    /// self-references are skipped, free slots are filled first, then slots
    /// from the reclaimable pool are overwritten in pool order. Whatever is
    /// left over is dropped.
    fn merge_subset(&mut self, subset: &[PeerId], reclaimable: Vec<usize>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut pool = reclaimable.into_iter();

        for &neighbor in subset {
            if neighbor == self.peer_id || self.cache.contains(&neighbor) {
                outcome.skipped += 1;
            } else if !self.cache.is_full() {
                self.cache.add(Entry::new(neighbor));
                outcome.appended += 1;
            } else if let Some(slot) = pool.next() {
                self.cache.replace(slot, Entry::new(neighbor));
                outcome.replaced += 1;
            } else {
                outcome.dropped += 1;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn small_config() -> ShuffleConfig {
        ShuffleConfig {
            cache_size: 4,
            shuffle_length: 3,
        }
    }

    fn cache_of(node: &GsNode) -> Vec<PeerId> {
        node.neighbors().collect()
    }

    fn reply_from(partner: PeerId, subset: Vec<PeerId>) -> MessageEnvelope {
        MessageEnvelope {
            sender: partner,
            receiver: 0,
            time: 0,
            message: Message::ShuffleReply { subset },
        }
    }

    fn request_from(requester: PeerId, subset: Vec<PeerId>) -> MessageEnvelope {
        MessageEnvelope {
            sender: requester,
            receiver: 0,
            time: 0,
            message: Message::ShuffleRequest { subset },
        }
    }

    /// Event sink that records everything, for asserting on engine behavior.
    struct RecordingSink {
        events: Rc<RefCell<Vec<(PeerId, Event)>>>,
    }

    impl EventSink for RecordingSink {
        fn log(&mut self, _round: GsTime, peer: PeerId, event: Event) {
            self.events.borrow_mut().push((peer, event));
        }
    }

    #[test]
    fn test_add_neighbor_rules() {
        let mut node = GsNode::new(1, 0, small_config());

        assert!(!node.add_neighbor(1), "self-references are refused");
        assert!(node.add_neighbor(2));
        assert!(!node.add_neighbor(2), "duplicates are refused");
        for n in [3, 4, 5] {
            assert!(node.add_neighbor(n));
        }
        assert!(!node.add_neighbor(6), "full cache refuses");

        assert_eq!(node.degree(), 4);
        assert_eq!(node.neighbor_at(0), Some(2));
        assert!(node.contains_neighbor(&5));
        assert!(!node.contains_neighbor(&6));
    }

    #[test]
    fn test_tick_with_empty_cache_is_noop() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut node = GsNode::new(1, 0, small_config());
        let mut out = Vec::new();

        node.tick(&mut rng, &mut out);

        assert!(out.is_empty());
        assert!(!node.is_awaiting_response());
        assert!(!node.shuffle_state().removed_partner());
    }

    #[test]
    fn test_tick_skipped_while_awaiting() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(2);
        node.add_neighbor(3);

        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);
        assert_eq!(out.len(), 1);
        assert!(node.is_awaiting_response());

        // second round: still waiting, nothing goes out
        out.clear();
        node.tick(&mut rng, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_request_shape_and_partner_eviction() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut node = GsNode::new(1, 0, small_config());
        for n in [10, 20, 30, 40] {
            node.add_neighbor(n);
        }
        assert_eq!(node.degree(), 4); // full

        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);

        assert_eq!(out.len(), 1);
        let envelope = &out[0];
        assert_eq!(envelope.sender, 1);
        let partner = envelope.receiver;
        assert!([10, 20, 30, 40].contains(&partner));

        let subset = match &envelope.message {
            Message::ShuffleRequest { subset } => subset.clone(),
            other => panic!("expected a request, got {:?}", other),
        };

        // up to l - 1 companions plus the sender itself, never the partner
        assert!(subset.len() <= 3);
        assert_eq!(*subset.last().unwrap(), 1);
        assert!(!subset.contains(&partner));
        let mut dedup = subset.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), subset.len());

        // full cache: the partner's slot is given up until the exchange resolves
        assert!(!node.contains_neighbor(&partner));
        assert_eq!(node.degree(), 3);
        assert!(node.is_awaiting_response());
        assert!(node.shuffle_state().removed_partner());
    }

    #[test]
    fn test_partner_kept_when_cache_not_full() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(2);
        node.add_neighbor(3);

        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);

        let partner = out[0].receiver;
        assert!(node.contains_neighbor(&partner));
        assert_eq!(node.degree(), 2);
        assert!(node.is_awaiting_response());
        assert!(!node.shuffle_state().removed_partner());
    }

    #[test]
    fn test_single_entry_cache_sends_self_only() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(7);

        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);

        assert_eq!(out[0].receiver, 7);
        match &out[0].message {
            Message::ShuffleRequest { subset } => assert_eq!(subset, &vec![1]),
            other => panic!("expected a request, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_merge_worked_example() {
        // Node 1 is mid-exchange with partner 200: the cache was full, the
        // partner's slot was given up, and neighbors 100 and 300 went out in
        // the request. The reply brings two unknown nodes and one known one.
        let mut node = GsNode::new(1, 0, small_config());
        for n in [100, 300, 400] {
            node.add_neighbor(n);
        }
        node.cache.mark_sent_to(0, 200);
        node.cache.mark_sent_to(1, 200);
        node.state.begin(true);

        node.handle_reply(200, &[500, 600, 400]);

        // 500 fills the free slot, 600 reclaims the first disclosed slot,
        // 400 is already known; the partner is not restored on a reply.
        assert_eq!(cache_of(&node), vec![600, 300, 400, 500]);
        assert!(!node.contains_neighbor(&200));
        assert!(!node.is_awaiting_response());
        assert!(!node.shuffle_state().removed_partner());
    }

    #[test]
    fn test_reply_merge_drops_overflow_without_reclaimable_slots() {
        let mut node = GsNode::new(1, 0, small_config());
        for n in [100, 200, 300, 400] {
            node.add_neighbor(n);
        }
        // waiting, but nothing was disclosed to this partner
        node.state.begin(false);

        node.handle_reply(200, &[500, 600]);

        assert_eq!(cache_of(&node), vec![100, 200, 300, 400]);
        assert!(!node.is_awaiting_response());
    }

    #[test]
    fn test_reply_merge_is_idempotent_on_known_neighbors() {
        let mut node = GsNode::new(1, 0, small_config());
        for n in [100, 200, 300] {
            node.add_neighbor(n);
        }
        node.state.begin(false);

        node.handle_reply(200, &[300, 100, 100]);

        assert_eq!(cache_of(&node), vec![100, 200, 300]);
        assert!(!node.is_awaiting_response());
    }

    #[test]
    fn test_reply_merge_skips_own_identity() {
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(100);
        node.state.begin(false);

        node.handle_reply(100, &[1, 500]);

        assert!(!node.contains_neighbor(&1), "a node never caches itself");
        assert!(node.contains_neighbor(&500));
        assert_eq!(node.degree(), 2);
    }

    #[test]
    fn test_stray_reply_while_idle_is_ignored() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(100);

        let mut out = Vec::new();
        node.handle_message(&reply_from(100, vec![500, 600]), &mut rng, &mut out);

        assert!(out.is_empty());
        assert_eq!(cache_of(&node), vec![100]);
        assert!(!node.is_awaiting_response());
    }

    #[test]
    fn test_reject_restores_evicted_partner() {
        let mut node = GsNode::new(1, 0, small_config());
        for n in [100, 300, 400] {
            node.add_neighbor(n);
        }
        node.state.begin(true);

        node.handle_rejected(200);

        assert_eq!(cache_of(&node), vec![100, 300, 400, 200]);
        assert!(!node.is_awaiting_response());
        assert!(!node.shuffle_state().removed_partner());
    }

    #[test]
    fn test_reject_without_eviction_only_clears_flags() {
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(100);
        node.add_neighbor(200);
        node.state.begin(false);

        node.handle_rejected(200);

        assert_eq!(cache_of(&node), vec![100, 200]);
        assert!(!node.is_awaiting_response());
    }

    #[test]
    fn test_busy_responder_rejects_without_cache_mutation() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(2);
        node.add_neighbor(3);

        let mut out = Vec::new();
        node.tick(&mut rng, &mut out);
        assert!(node.is_awaiting_response());
        let before = cache_of(&node);

        out.clear();
        node.handle_message(&request_from(99, vec![50, 60, 99]), &mut rng, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].receiver, 99);
        assert_eq!(out[0].message, Message::ShuffleRejected);
        assert_eq!(cache_of(&node), before);
        assert!(node.is_awaiting_response(), "still waiting on its own exchange");
    }

    #[test]
    fn test_idle_responder_replies_and_absorbs() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut node = GsNode::new(1, 0, small_config());
        node.add_neighbor(10);
        node.add_neighbor(20);
        let before = cache_of(&node);

        let mut out = Vec::new();
        node.handle_message(&request_from(99, vec![30, 99]), &mut rng, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].receiver, 99);
        let reply_subset = match &out[0].message {
            Message::ShuffleReply { subset } => subset.clone(),
            other => panic!("expected a reply, got {:?}", other),
        };

        // the reply is drawn from the pre-merge cache
        assert!(reply_subset.len() <= 3);
        assert!(reply_subset.iter().all(|n| before.contains(n)));

        // both incoming identities fit in the free slots
        assert_eq!(cache_of(&node), vec![10, 20, 30, 99]);
        assert!(!node.is_awaiting_response(), "responding does not start an exchange");
    }

    #[test]
    fn test_full_responder_reclaims_just_sent_slots() {
        let mut rng = StdRng::seed_from_u64(29);
        let config = ShuffleConfig {
            cache_size: 2,
            shuffle_length: 2,
        };
        let mut node = GsNode::new(1, 0, config);
        node.add_neighbor(10);
        node.add_neighbor(20);

        let mut out = Vec::new();
        node.handle_message(&request_from(99, vec![30, 99]), &mut rng, &mut out);

        // with l = 2 both slots went into the reply, so both are fair game
        let after = cache_of(&node);
        assert_eq!(after.len(), 2);
        assert!(after.contains(&30));
        assert!(after.contains(&99));
    }

    #[test]
    fn test_two_node_exchange_completes() {
        let mut rng = StdRng::seed_from_u64(31);
        let config = small_config();
        let mut p = GsNode::new(1, 0, config);
        let mut q = GsNode::new(2, 0, config);
        p.add_neighbor(2);
        q.add_neighbor(1);
        q.add_neighbor(3);

        let mut requests = Vec::new();
        p.tick(&mut rng, &mut requests);
        assert_eq!(requests[0].receiver, 2);

        let mut replies = Vec::new();
        q.handle_message(&requests[0], &mut rng, &mut replies);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].receiver, 1);

        let mut rest = Vec::new();
        p.handle_message(&replies[0], &mut rng, &mut rest);
        assert!(rest.is_empty());

        assert!(!p.is_awaiting_response());
        assert!(!q.is_awaiting_response());
        assert!(q.contains_neighbor(&1), "responder learned the initiator");
        assert!(!cache_of(&p).contains(&1));
        assert!(!cache_of(&q).contains(&2));
    }

    #[test]
    fn test_exchange_events_are_logged() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut rng = StdRng::seed_from_u64(37);
        let config = small_config();
        let mut p = GsNode::new_with_sink(
            1,
            0,
            config,
            Box::new(RecordingSink {
                events: events.clone(),
            }),
        );
        let mut q = GsNode::new_with_sink(
            2,
            0,
            config,
            Box::new(RecordingSink {
                events: events.clone(),
            }),
        );
        p.add_neighbor(2);
        q.add_neighbor(1);

        let mut requests = Vec::new();
        p.tick(&mut rng, &mut requests);
        let mut replies = Vec::new();
        q.handle_message(&requests[0], &mut rng, &mut replies);
        let mut rest = Vec::new();
        p.handle_message(&replies[0], &mut rng, &mut rest);

        let log = events.borrow();
        assert_eq!(log.len(), 3);
        assert!(matches!(
            log[0],
            (1, Event::ShuffleStarted { partner: 2, .. })
        ));
        assert!(matches!(
            log[1],
            (2, Event::RequestAnswered { requester: 1, .. })
        ));
        assert!(matches!(
            log[2],
            (1, Event::ExchangeCompleted { partner: 2, .. })
        ));
    }

    #[test]
    fn test_overlay_invariants_over_many_rounds() {
        let mut rng = StdRng::seed_from_u64(41);
        let config = ShuffleConfig {
            cache_size: 5,
            shuffle_length: 3,
        };
        let ids: Vec<PeerId> = (1..=16).collect();
        let mut nodes: Vec<GsNode> = ids
            .iter()
            .map(|&id| GsNode::new(id, 0, config))
            .collect();

        // ring bootstrap: each node knows its successor
        for i in 0..nodes.len() {
            let next = ids[(i + 1) % ids.len()];
            nodes[i].add_neighbor(next);
        }

        let index_of = |id: PeerId| (id - 1) as usize;
        for _round in 0..50 {
            let mut wave: Vec<MessageEnvelope> = Vec::new();
            for node in nodes.iter_mut() {
                node.tick(&mut rng, &mut wave);
            }

            // deliver until quiet; replies and rejects generate no follow-ups
            while !wave.is_empty() {
                wave.shuffle(&mut rng);
                let mut next_wave = Vec::new();
                for envelope in &wave {
                    nodes[index_of(envelope.receiver)].handle_message(
                        envelope,
                        &mut rng,
                        &mut next_wave,
                    );
                }
                wave = next_wave;
            }

            for node in &nodes {
                assert!(
                    !node.is_awaiting_response(),
                    "all exchanges resolve once every message is delivered"
                );
                assert!(node.degree() <= config.cache_size);
                let mut seen = cache_of(node);
                seen.sort_unstable();
                let unique = seen.len();
                seen.dedup();
                assert_eq!(seen.len(), unique, "no duplicate neighbors");
                assert!(!seen.contains(&node.get_peer_id()), "no self-references");
                assert!(node.degree() >= 1, "a node never loses its last neighbor");
            }
        }
    }
}
