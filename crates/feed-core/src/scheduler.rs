//! Propagation Scheduler
//!
//! Owns the world: the agent roster, the shared message log, the pending
//! event queue and the virtual clock. One `run_round` call delivers the
//! queued events to every online agent at an explicit propagation depth,
//! collects the reactions back into the queue, then prunes exhausted
//! entries.

use crate::agent::{Agent, Reaction, TurnCtx};
use crate::config::SimConfig;
use crate::oracle::{EmbeddingOracle, TextOracle};
use feed_events::{EventQueue, MessageLog, PendingEvent, VirtualClock};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Full mutable world state for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Roster keyed by agent name.
    pub agents: BTreeMap<String, Agent>,
    pub log: MessageLog,
    pub queue: EventQueue,
    pub clock: VirtualClock,
}

/// What one round did, for logging and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub depth: u32,
    /// Events delivered across all agents.
    pub delivered: usize,
    /// Reactions that produced a message.
    pub posted: usize,
    /// Queue entries pruned at the end of the round.
    pub pruned: usize,
}

impl Simulation {
    pub fn new(agents: impl IntoIterator<Item = Agent>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|agent| (agent.name.clone(), agent))
                .collect(),
            log: MessageLog::new(),
            queue: EventQueue::new(),
            clock: VirtualClock::start(),
        }
    }

    /// Runs one propagation round at depth `depth`.
    ///
    /// A near-empty queue is bootstrapped first: distinct random online
    /// agents are forced to post about `seed_text` so the feed never
    /// starves. Reactions emitted during the round are enqueued at `depth`
    /// and delivered no earlier than the next round.
    pub fn run_round(
        &mut self,
        seed_text: &str,
        depth: u32,
        config: &SimConfig,
        rng: &mut SmallRng,
        text: &dyn TextOracle,
        embed: &dyn EmbeddingOracle,
    ) -> RoundSummary {
        if self.queue.len() <= 1 {
            self.bootstrap(seed_text, depth, config, rng, text, embed);
        }

        // Rounds operate on a frozen snapshot; reactions join the queue
        // behind it and wait for the next round.
        let snapshot = self.queue.snapshot();
        let (mandatory, rest): (Vec<PendingEvent>, Vec<PendingEvent>) =
            snapshot.into_iter().partition(|event| event.depth == 0);

        let names: Vec<String> = self.agents.keys().cloned().collect();
        let mut delivered = 0;
        let mut posted = 0;

        for name in names {
            let Some(agent) = self.agents.get(&name) else {
                continue;
            };
            if !agent.online {
                debug!(agent = name.as_str(), "offline, skipping round");
                continue;
            }

            // Mandatory entries always go through; the rest fill the
            // fan-out budget by uniform sample.
            let budget = config.round.fan_out.saturating_sub(mandatory.len());
            let mut batch: Vec<&PendingEvent> = mandatory.iter().collect();
            batch.extend(rest.choose_multiple(rng, budget));

            for event in batch {
                let Some(agent) = self.agents.get_mut(&name) else {
                    continue;
                };
                delivered += 1;
                let reaction = {
                    let mut ctx = TurnCtx {
                        log: &mut self.log,
                        clock: &mut self.clock,
                        rng: &mut *rng,
                        text,
                        embed,
                        config,
                        depth,
                    };
                    agent.react_to_event(&event.content, event.time, &event.id, &mut ctx)
                };
                if let Reaction::Posted { message_id, description } = reaction {
                    posted += 1;
                    let time = self
                        .log
                        .get(&message_id)
                        .map(|m| m.post_time)
                        .unwrap_or_else(|| self.clock.current());
                    self.queue
                        .push_back(PendingEvent::new(description, time, message_id, depth));
                }
            }
        }

        // Entries below the current depth have exhausted their reach.
        let pruned = if depth == 0 {
            0
        } else {
            self.queue.prune_at_or_below(depth - 1)
        };

        let summary = RoundSummary { depth, delivered, posted, pruned };
        info!(
            depth,
            delivered,
            posted,
            pruned,
            queue = self.queue.len(),
            messages = self.log.len(),
            "round complete"
        );
        summary
    }

    /// Forces distinct random online agents to post about the seed so a
    /// drained queue refills. Bootstrap output lands one depth below the
    /// round so the round itself still delivers it.
    fn bootstrap(
        &mut self,
        seed_text: &str,
        depth: u32,
        config: &SimConfig,
        rng: &mut SmallRng,
        text: &dyn TextOracle,
        embed: &dyn EmbeddingOracle,
    ) {
        let bootstrap_depth = depth.saturating_sub(1);
        let online: Vec<String> = self
            .agents
            .values()
            .filter(|agent| agent.online)
            .map(|agent| agent.name.clone())
            .collect();
        let chosen: Vec<String> = online
            .choose_multiple(rng, config.round.bootstrap_posts)
            .cloned()
            .collect();

        for name in chosen {
            let Some(agent) = self.agents.get_mut(&name) else {
                continue;
            };
            let reaction = {
                let mut ctx = TurnCtx {
                    log: &mut self.log,
                    clock: &mut self.clock,
                    rng: &mut *rng,
                    text,
                    embed,
                    config,
                    depth: bootstrap_depth,
                };
                agent.force_post(seed_text, &mut ctx)
            };
            if let Reaction::Posted { message_id, description } = reaction {
                info!(agent = name.as_str(), message_id = message_id.as_str(), "bootstrap post");
                let time = self
                    .log
                    .get(&message_id)
                    .map(|m| m.post_time)
                    .unwrap_or_else(|| self.clock.current());
                self.queue
                    .push_back(PendingEvent::new(description, time, message_id, bootstrap_depth));
            }
        }
    }
}
