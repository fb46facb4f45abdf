use std::collections::BTreeMap;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use simple_logger::SimpleLogger;

use gs_rust::{GsNode, Message, MessageEnvelope, PeerId, ShuffleConfig};

fn main() {
    SimpleLogger::new().init().unwrap();

    info!("starting");

    let rounds = 500;
    let num_of_peers = 1000;
    let bootstrap_degree = 5;
    let config = ShuffleConfig::default();

    let mut seed = [0u8; 32];
    rand::thread_rng().fill(&mut seed);
    let mut rng = StdRng::from_seed(seed);

    // create starting peers
    let peers: Vec<PeerId> = (0..num_of_peers).map(|_| rng.next_u64()).collect();

    // make nodes, each seeded with a few random neighbors
    let mut nodes: BTreeMap<PeerId, GsNode> = BTreeMap::new();
    for peer_id in &peers {
        let mut node = GsNode::new(*peer_id, 0, config);

        for add_peer in peers.choose_multiple(&mut rng, bootstrap_degree) {
            node.add_neighbor(*add_peer);
        }

        nodes.insert(*peer_id, node);
    }

    // iterations
    let mut message_count = 0;
    let mut counters = (0, 0, 0);
    let mut messages: Vec<MessageEnvelope> = Vec::new();
    for i in 0..rounds {
        let mut next: Vec<MessageEnvelope> = Vec::new();

        let number_of_messages = messages.len();
        if number_of_messages > 0 {
            messages.shuffle(&mut rng);
            // delay: push a fraction to next
            next.extend_from_slice(&messages[(number_of_messages / 2)..number_of_messages]);
            // drop a fraction (network loss)
            messages.truncate(number_of_messages / 2 - number_of_messages / 50);
        }

        for m in &messages {
            if let Some(node) = nodes.get_mut(&m.receiver) {
                match m.message {
                    Message::ShuffleRequest { .. } => counters.0 += 1,
                    Message::ShuffleReply { .. } => counters.1 += 1,
                    Message::ShuffleRejected => counters.2 += 1,
                };
                node.handle_message(m, &mut rng, &mut next);
            }
        }

        // next round
        for (_, node) in &mut nodes {
            node.tick(&mut rng, &mut next);
        }

        if i % 100 == 0 {
            info!("{}: {} messages in flight", i, next.len());
        }

        message_count += messages.len();
        messages.clear();
        messages.append(&mut next);
    }

    let stats = nodes
        .iter()
        .map(|(_, node)| node.degree())
        .fold((usize::MIN, usize::MAX, usize::MIN), |acc, e| {
            (usize::max(acc.0, e), usize::min(acc.1, e), acc.2 + e)
        });

    let waiting = nodes
        .values()
        .filter(|node| node.is_awaiting_response())
        .count();

    info!(
        "Neighbors ({}): max: {} min: {} avg: {}",
        nodes.len(),
        stats.0,
        stats.1,
        stats.2 / nodes.len()
    );

    info!("let seed = {:?};", seed);
    info!(
        "done. Messages {}. still waiting: {}, {:?} dist (req/reply/reject)",
        message_count, waiting, counters
    );
}
