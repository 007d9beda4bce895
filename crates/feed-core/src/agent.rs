//! Agent Decision Core
//!
//! Each agent reacts to delivered events through a fixed pipeline: observe
//! and appraise, maybe like, pass the probabilistic reply gate, maybe
//! reflect, compose and post. Agents never hold the world; every turn they
//! receive a narrow [`TurnCtx`] with exactly the capabilities the pipeline
//! needs.

use crate::config::SimConfig;
use crate::memory::{Memory, MemoryStore};
use crate::oracle::parse::{self, Stance};
use crate::oracle::{EmbeddingOracle, TextOracle};
use feed_events::{generate_message_id, FeedTimestamp, Message, MessageLog, VirtualClock};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Static character sheet for an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    pub occupation: String,
    pub background: String,
    pub character: String,
    pub interests: String,
}

/// How an agent currently feels about another agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeling {
    pub label: String,
    /// 0..=10.
    pub score: f32,
}

/// Capabilities an agent may use during one turn. Built fresh by the
/// scheduler for each dispatch; agents keep no reference to it afterwards.
pub struct TurnCtx<'a> {
    pub log: &'a mut MessageLog,
    pub clock: &'a mut VirtualClock,
    pub rng: &'a mut SmallRng,
    pub text: &'a dyn TextOracle,
    pub embed: &'a dyn EmbeddingOracle,
    pub config: &'a SimConfig,
    /// Propagation depth of the current round.
    pub depth: u32,
}

/// Outcome of one agent turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// The agent declined to post. Always a normal outcome, never an error.
    None,
    /// The agent posted; `description` is the event text to propagate.
    Posted {
        message_id: String,
        description: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub persona: Persona,
    pub experiences: MemoryStore,
    /// Feelings toward other agents, keyed by agent name.
    pub feelings: BTreeMap<String, Feeling>,
    pub mood: String,
    /// Set after the first fresh (non-reply) post; later non-reply
    /// compositions are discarded so one agent floods the feed at most once.
    pub has_posted_fresh: bool,
    pub online: bool,
}

impl Agent {
    pub fn new(name: impl Into<String>, persona: Persona) -> Self {
        Self {
            name: name.into(),
            persona,
            experiences: MemoryStore::new(),
            feelings: BTreeMap::new(),
            mood: "neutral".to_string(),
            has_posted_fresh: false,
            online: true,
        }
    }

    fn persona_block(&self) -> String {
        format!(
            "You are {}, a {}. Background: {}. Character: {}. Interests: {}. Current mood: {}.",
            self.name,
            self.persona.occupation,
            self.persona.background,
            self.persona.character,
            self.persona.interests,
            self.mood
        )
    }

    fn memory_block(memories: &[Memory]) -> String {
        if memories.is_empty() {
            return "(no relevant memories)".to_string();
        }
        memories
            .iter()
            .map(|m| format!("- [{}] {}", m.emotion_type, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reacts to one delivered event. Every path returns a [`Reaction`];
    /// oracle misbehavior degrades to neutral defaults and is never an error.
    pub fn react_to_event(
        &mut self,
        content: &str,
        time: FeedTimestamp,
        event_id: &str,
        ctx: &mut TurnCtx,
    ) -> Reaction {
        let source = ctx.log.get(event_id).cloned();

        // Own messages never trigger a reaction.
        if let Some(message) = &source {
            if message.author == self.name {
                return Reaction::None;
            }
        }

        let reply_ctx = ctx.log.reply_context(event_id);
        let parent_id = reply_ctx.as_ref().and_then(|c| c.parent_id.clone());
        let parent_author = match &parent_id {
            Some(pid) => match ctx.log.get(pid) {
                Some(parent) => Some(parent.author.clone()),
                None => {
                    warn!(event_id, parent_id = pid.as_str(), "parent message missing, treating event as unparented");
                    None
                }
            },
            None => None,
        };

        let description = match &parent_author {
            Some(author) => format!("(in a thread under {author}) {content}"),
            None => content.to_string(),
        };

        // Observe. A reply is only ever scrolled past when the agent
        // already judged its parent low-relevance: the roll is uniform in
        // [0, 1) against the raw 0..=10 intensity, so any parent remembered
        // at intensity >= 1 is always observed.
        let newly_observed = if self.experiences.contains(event_id) {
            false
        } else {
            let observes = match &parent_id {
                Some(pid) => {
                    let parent_intensity = self
                        .experiences
                        .get(pid)
                        .map(|m| m.emotion_intensity)
                        .unwrap_or(5.0);
                    ctx.rng.gen::<f32>() < parent_intensity
                }
                None => true,
            };
            if observes {
                self.observe(&description, time, event_id, ctx);
                true
            } else {
                debug!(agent = self.name.as_str(), event_id, "reply scrolled past unobserved");
                false
            }
        };

        let intensity = match self.experiences.get(event_id) {
            Some(memory) => memory.emotion_intensity,
            None => return Reaction::None,
        };

        // Like. Only worth an oracle round-trip when the event is fresh to
        // this agent or still burns above the midline.
        if newly_observed || intensity > 4.0 {
            let prompt = format!(
                "{}\nYou just read: {}\nWould you press the like button on it? Answer YES or NO.",
                self.persona_block(),
                description
            );
            if parse::parse_yes(&ctx.text.complete(&self.persona_block(), &prompt))
                && source.is_some()
            {
                ctx.log.like(event_id, &self.name);
            }
        }

        // A spent memory ends the turn before any composition oracle call.
        if intensity <= 0.0 {
            return Reaction::None;
        }

        // Reply gate. The offset shapes how eagerly the agent engages:
        // threads that loop back to its own words amplify, strangers'
        // threads dampen, fresh posts sit in between.
        let gate = &ctx.config.gate;
        let offset = if parent_id.is_some() {
            if ctx.log.chain_reaches_author(event_id, &self.name) {
                gate.reply_to_self_offset
            } else {
                gate.reply_other_offset
            }
        } else {
            gate.fresh_post_offset
        };
        let roll = ctx.rng.gen::<f32>() * offset;
        if roll > intensity / 10.0 {
            if let Some(memory) = self.experiences.get_mut(event_id) {
                memory.emotion_intensity *= gate.skip_decay;
            }
            debug!(agent = self.name.as_str(), event_id, roll, "reply gate closed");
            return Reaction::None;
        }

        // Reflection fires only on reactions intense enough to beat a
        // biased roll.
        if intensity > ctx.rng.gen::<f32>() * 10.0 + gate.reflection_bias {
            self.reflect(&description, parent_author.as_deref(), ctx);
        }

        self.compose_and_post(&description, event_id, ctx)
    }

    /// Appraises an event with the text oracle and records the memory.
    fn observe(&mut self, description: &str, time: FeedTimestamp, event_id: &str, ctx: &mut TurnCtx) {
        let prompt = format!(
            "{}\nYou just read: {}\nOn a scale of 1 to 10, rate how important this is to you, \
             name the emotion it stirs, and rate its intensity from 0 to 10.\n\
             Reply as: importance, emotion, intensity",
            self.persona_block(),
            description
        );
        let appraisal =
            parse::parse_appraisal(&ctx.text.complete(&self.persona_block(), &prompt)).value();
        self.experiences.record(
            event_id,
            Memory::new(
                description,
                appraisal.importance,
                time,
                appraisal.emotion_type,
                appraisal.intensity,
                ctx.depth,
            ),
        );
    }

    /// Distills a question and an insight from memory, updates the feeling
    /// toward the counterpart, and refreshes mood.
    fn reflect(&mut self, description: &str, counterpart: Option<&str>, ctx: &mut TurnCtx) {
        let now = ctx.clock.current();
        let retrieved = self.experiences.retrieve(
            description,
            ctx.config.retrieval.top_k,
            now,
            &ctx.config.retrieval,
            ctx.embed,
        );
        let question_prompt = format!(
            "{}\nRecent memories:\n{}\nWhat is the single most pressing question on your mind right now?",
            self.persona_block(),
            Self::memory_block(&retrieved)
        );
        let question = ctx.text.complete(&self.persona_block(), &question_prompt);

        let related = self.experiences.retrieve(
            &question,
            ctx.config.retrieval.top_k,
            now,
            &ctx.config.retrieval,
            ctx.embed,
        );
        let insight_prompt = format!(
            "{}\nQuestion: {}\nMemories:\n{}\nIn one sentence, what insight do you draw from these?",
            self.persona_block(),
            question,
            Self::memory_block(&related)
        );
        let insight = ctx.text.complete(&self.persona_block(), &insight_prompt);
        let insight_id = reflection_id(&insight, now, ctx.rng);
        self.experiences.record(
            insight_id,
            Memory::new(insight, 10, now, "reflective", 1.0, ctx.depth),
        );

        if let Some(name) = counterpart {
            let feeling_prompt = format!(
                "{}\nAfter this exchange, how do you feel about {name}? \
                 Reply as: feeling, score from 0 to 10",
                self.persona_block()
            );
            let (label, score) =
                parse::parse_label_score(&ctx.text.complete(&self.persona_block(), &feeling_prompt))
                    .value();
            self.feelings
                .insert(name.to_string(), Feeling { label, score });
        }

        let mood_prompt = format!(
            "{}\nIn one or two words, what is your current mood now?",
            self.persona_block()
        );
        self.mood = ctx
            .text
            .complete(&self.persona_block(), &mood_prompt)
            .trim()
            .to_string();
    }

    /// Composition and emission. The oracle's own output decides whether the
    /// post addresses the event's author (reply) or stands alone.
    fn compose_and_post(&mut self, description: &str, event_id: &str, ctx: &mut TurnCtx) -> Reaction {
        let now = ctx.clock.current();
        let retrieved = self.experiences.retrieve(
            description,
            ctx.config.retrieval.top_k,
            now,
            &ctx.config.retrieval,
            ctx.embed,
        );

        let motivation_prompt = format!(
            "{}\nMemories:\n{}\nIn one sentence, summarize what these memories make you want to say.",
            self.persona_block(),
            Self::memory_block(&retrieved)
        );
        let motivation = ctx.text.complete(&self.persona_block(), &motivation_prompt);

        let stance_prompt = format!(
            "{}\nYou read: {}\nGiven your memories, do you agree or disagree with it?",
            self.persona_block(),
            description
        );
        let stance = parse::parse_stance(&ctx.text.complete(&self.persona_block(), &stance_prompt));
        let stance_word = match stance {
            Stance::Agree => "You agree with it.",
            Stance::Disagree => "You disagree with it.",
        };

        let author_hint = ctx
            .log
            .get(event_id)
            .map(|m| format!("If you are answering them directly, start with @{}. ", m.author))
            .unwrap_or_default();
        let compose_prompt = format!(
            "{}\nYou read: {}\n{}\nMotivation: {}\n{}write the post now, in your own voice.",
            self.persona_block(),
            description,
            stance_word,
            motivation.trim(),
            author_hint
        );
        let content = ctx
            .text
            .complete(&self.persona_block(), &compose_prompt)
            .trim()
            .to_string();

        // A template the oracle failed to fill is discarded, not posted.
        if content.is_empty() || content.contains('{') || content.contains('}') {
            debug!(agent = self.name.as_str(), "composition left unfilled, dropping");
            return Reaction::None;
        }

        let is_reply = content.starts_with('@') && ctx.log.contains(event_id);
        if !is_reply && self.has_posted_fresh {
            debug!(agent = self.name.as_str(), "fresh post already spent this scenario");
            return Reaction::None;
        }

        let post_time = ctx.clock.advance(ctx.rng);
        let id = self.fresh_message_id(&content, post_time, ctx);
        let mut message = Message::new(content.clone(), self.name.clone(), post_time, id.clone(), ctx.depth);
        if is_reply {
            message = message.with_reply_to(event_id);
        }
        ctx.log.append(message);

        let description = if is_reply {
            // Replying re-opens the memory; ask the oracle how hot it runs now.
            let reestimate_prompt = format!(
                "{}\nYou just replied to: {}\nHow intense is your feeling about it now, from 0 to 10?",
                self.persona_block(),
                description
            );
            let new_intensity =
                parse::parse_intensity(&ctx.text.complete(&self.persona_block(), &reestimate_prompt))
                    .value();
            if let Some(memory) = self.experiences.get_mut(event_id) {
                memory.emotion_intensity = new_intensity;
            }
            format!("{} replied: {}", self.name, content)
        } else {
            self.has_posted_fresh = true;
            format!("{} posted: {}", self.name, content)
        };

        Reaction::Posted {
            message_id: id,
            description,
        }
    }

    /// Bootstrap path: seeds a fresh post directly from `seed_text`,
    /// bypassing the reply gate.
    pub fn force_post(&mut self, seed_text: &str, ctx: &mut TurnCtx) -> Reaction {
        let now = ctx.clock.current();
        let seed_id = seed_event_id(seed_text);
        if !self.experiences.contains(&seed_id) {
            self.observe(seed_text, now, &seed_id, ctx);
        }
        self.reflect(seed_text, None, ctx);

        let retrieved = self.experiences.retrieve(
            seed_text,
            ctx.config.retrieval.top_k,
            now,
            &ctx.config.retrieval,
            ctx.embed,
        );
        let compose_prompt = format!(
            "{}\nSomething happened: {}\nMemories:\n{}\nwrite the post you would share about it.",
            self.persona_block(),
            seed_text,
            Self::memory_block(&retrieved)
        );
        let content = ctx
            .text
            .complete(&self.persona_block(), &compose_prompt)
            .trim()
            .trim_start_matches('@')
            .to_string();
        let content = if content.is_empty() || content.contains('{') || content.contains('}') {
            // The feed must not stall on a bad completion; fall back to the
            // seed itself.
            seed_text.to_string()
        } else {
            content
        };

        let post_time = ctx.clock.advance(ctx.rng);
        let id = self.fresh_message_id(&content, post_time, ctx);
        ctx.log.append(Message::new(
            content.clone(),
            self.name.clone(),
            post_time,
            id.clone(),
            ctx.depth,
        ));
        self.has_posted_fresh = true;

        Reaction::Posted {
            message_id: id,
            description: format!("{} posted: {}", self.name, content),
        }
    }

    /// Answers an out-of-band question from the agent's memories and
    /// feelings. Interview-only; touches no simulation state besides the
    /// embedding cache.
    pub fn ask_question(&mut self, question: &str, about: Option<&str>, ctx: &mut TurnCtx) -> String {
        let now = ctx.clock.current();
        let retrieved = self.experiences.retrieve(
            question,
            ctx.config.retrieval.top_k,
            now,
            &ctx.config.retrieval,
            ctx.embed,
        );
        let feeling_line = about
            .and_then(|name| {
                self.feelings
                    .get(name)
                    .map(|f| format!("You feel {} (score {}) about {}.\n", f.label, f.score, name))
            })
            .unwrap_or_default();
        let prompt = format!(
            "{}\n{}Memories:\n{}\nAnswer this question in your own voice: {}",
            self.persona_block(),
            feeling_line,
            Self::memory_block(&retrieved),
            question
        );
        ctx.text.complete(&self.persona_block(), &prompt)
    }

    fn fresh_message_id(&self, content: &str, time: FeedTimestamp, ctx: &mut TurnCtx) -> String {
        let mut id = generate_message_id(content, time, ctx.rng);
        if ctx.config.ids.enforce_unique {
            while ctx.log.contains(&id) {
                id = generate_message_id(content, time, ctx.rng);
            }
        }
        id
    }
}

/// Ids for memories that do not originate from a feed message.
fn reflection_id(content: &str, time: FeedTimestamp, rng: &mut SmallRng) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let salt: u64 = rng.gen();
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    time.minutes().hash(&mut hasher);
    salt.hash(&mut hasher);
    format!("mem_{:016x}", hasher.finish())
}

/// Stable id for a seed event, derived from its text alone so that
/// observing the same seed twice hits the same memory slot.
pub(crate) fn seed_event_id(text: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("evt_{:016x}", hasher.finish())
}
