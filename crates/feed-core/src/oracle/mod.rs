//! Oracle Interfaces
//!
//! The simulation consults two black boxes: a text oracle for appraisal,
//! reflection and composition, and an embedding oracle for retrieval
//! relevance. Both are traits so runs can swap a remote service for the
//! deterministic offline implementations shipped here.

pub mod parse;

use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

/// Blocking text completion. Replies are free-form; callers run them
/// through [`parse`] and never treat bad output as an error.
pub trait TextOracle {
    fn complete(&self, system: &str, prompt: &str) -> String;
}

/// Maps text to a fixed-length vector. Must be deterministic within a
/// session so cached embeddings stay comparable.
pub trait EmbeddingOracle {
    fn embed(&self, text: &str) -> Vec<f32>;
}

fn hash_u64(parts: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
    }
    hasher.finish()
}

/// Deterministic bag-of-tokens embedder. Each whitespace token hashes to a
/// bucket of a fixed-dimension vector; shared vocabulary between two texts
/// shows up as cosine similarity. A stand-in for an external embedding
/// service that keeps offline runs self-contained.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EmbeddingOracle for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_ascii_lowercase();
            if token.is_empty() {
                continue;
            }
            let bucket = (hash_u64(&[&token]) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        vector
    }
}

/// Emotion labels the offline oracle cycles through.
const OFFLINE_EMOTIONS: [&str; 6] = ["curious", "excited", "worried", "amused", "skeptical", "calm"];

const OFFLINE_MOODS: [&str; 4] = ["thoughtful", "restless", "upbeat", "wary"];

/// Deterministic stand-in for a remote text oracle. Routes on recognizable
/// phrases in the prompt and derives its answers from a hash of the prompt
/// and a seed, so the same run replays identically.
#[derive(Debug, Clone)]
pub struct OfflineOracle {
    seed: u64,
}

impl OfflineOracle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn roll(&self, prompt: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        prompt.hash(&mut hasher);
        hasher.finish()
    }

    /// First "@name" token in the prompt, used to address composed replies.
    fn addressee(prompt: &str) -> Option<&str> {
        prompt
            .split_whitespace()
            .find(|token| token.len() > 1 && token.starts_with('@'))
            .map(|token| token.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
    }
}

impl TextOracle for OfflineOracle {
    fn complete(&self, _system: &str, prompt: &str) -> String {
        let roll = self.roll(prompt);
        if prompt.contains("rate how important") {
            let importance = 1 + roll % 10;
            let emotion = OFFLINE_EMOTIONS[(roll >> 8) as usize % OFFLINE_EMOTIONS.len()];
            let intensity = (roll >> 16) % 11;
            format!("{importance}, {emotion}, {intensity}")
        } else if prompt.contains("press the like button") {
            if roll % 3 == 0 { "YES".to_string() } else { "NO".to_string() }
        } else if prompt.contains("most pressing question") {
            "What does this change for the people around me?".to_string()
        } else if prompt.contains("what insight") {
            "Strong reactions usually point at something I care about.".to_string()
        } else if prompt.contains("how do you feel about") {
            let emotion = OFFLINE_EMOTIONS[roll as usize % OFFLINE_EMOTIONS.len()];
            let score = (roll >> 8) % 11;
            format!("{emotion}, {score}")
        } else if prompt.contains("current mood") {
            OFFLINE_MOODS[roll as usize % OFFLINE_MOODS.len()].to_string()
        } else if prompt.contains("agree or disagree") {
            if roll % 2 == 0 { "agree".to_string() } else { "disagree".to_string() }
        } else if prompt.contains("from 0 to 10") {
            format!("{}", roll % 11)
        } else if prompt.contains("write the post") {
            let body = match (roll >> 4) % 4 {
                0 => "I keep turning this over and it does not sit right with me.",
                1 => "This is exactly the kind of thing we should be talking about.",
                2 => "Not sure everyone sees what is actually at stake here.",
                _ => "Been thinking about this all day and I have questions.",
            };
            match Self::addressee(prompt) {
                Some(name) => format!("{name} {body}"),
                None => body.to_string(),
            }
        } else if prompt.contains("summarize") {
            "These memories pull me toward speaking up about what I have seen.".to_string()
        } else {
            "I am not sure, but it stays with me.".to_string()
        }
    }
}

/// Queue-driven oracle for tests: pops canned replies in order and falls
/// back to a default once the queue drains. Counts calls so gate tests can
/// assert that skipped turns issue no completions.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<String>>,
    default_reply: String,
    calls: Cell<usize>,
}

impl ScriptedOracle {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            default_reply: String::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TextOracle for ScriptedOracle {
    fn complete(&self, _system: &str, _prompt: &str) -> String {
        self.calls.set(self.calls.get() + 1);
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    #[test]
    fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("the harvest festival was cancelled");
        let b = embedder.embed("the harvest festival was cancelled");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_hash_embedder_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(64);
        let query = embedder.embed("harvest festival cancelled");
        let related = embedder.embed("they cancelled the harvest festival today");
        let unrelated = embedder.embed("compiler error in the build pipeline");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_offline_oracle_is_deterministic() {
        let oracle = OfflineOracle::new(7);
        let prompt = "On a scale of 1 to 10, rate how important this is.";
        assert_eq!(oracle.complete("", prompt), oracle.complete("", prompt));
    }

    #[test]
    fn test_offline_oracle_appraisal_parses() {
        let oracle = OfflineOracle::new(42);
        let reply = oracle.complete("", "rate how important this event feels");
        assert!(!parse::parse_appraisal(&reply).is_fallback());
    }

    #[test]
    fn test_offline_oracle_addresses_reply() {
        let oracle = OfflineOracle::new(1);
        let reply = oracle.complete("", "You are replying to @Quill_Mara. write the post now.");
        assert!(reply.starts_with("@Quill_Mara"));
    }

    #[test]
    fn test_scripted_oracle_pops_in_order_and_counts() {
        let oracle = ScriptedOracle::new(["first", "second"]).with_default("done");
        assert_eq!(oracle.complete("", ""), "first");
        assert_eq!(oracle.complete("", ""), "second");
        assert_eq!(oracle.complete("", ""), "done");
        assert_eq!(oracle.calls(), 3);
    }
}
