//! Memory Model & Retrieval
//!
//! Each agent keeps a store of appraised memories, one per observed event.
//! Retrieval ranks the whole store against a query by four components
//! (recency, importance, relevance, emotional intensity), each min-max
//! normalized over the current set, then weighted and summed.

use crate::config::RetrievalConfig;
use crate::oracle::EmbeddingOracle;
use feed_events::FeedTimestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single appraised memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub content: String,
    /// Subjective importance, 1..=10.
    pub importance: u8,
    pub event_time: FeedTimestamp,
    pub emotion_type: String,
    /// Emotional intensity, 0..=10. Decays when the agent declines to react.
    pub emotion_intensity: f32,
    /// Lazily computed and cached on first retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Propagation depth at which the memory was recorded.
    pub depth: u32,
}

impl Memory {
    pub fn new(
        content: impl Into<String>,
        importance: u8,
        event_time: FeedTimestamp,
        emotion_type: impl Into<String>,
        emotion_intensity: f32,
        depth: u32,
    ) -> Self {
        Self {
            content: content.into(),
            importance,
            event_time,
            emotion_type: emotion_type.into(),
            emotion_intensity,
            embedding: None,
            depth,
        }
    }
}

/// Per-agent memory store keyed by the originating event id. Recording the
/// same event twice overwrites the earlier appraisal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    memories: BTreeMap<String, Memory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.memories.contains_key(event_id)
    }

    pub fn get(&self, event_id: &str) -> Option<&Memory> {
        self.memories.get(event_id)
    }

    pub fn get_mut(&mut self, event_id: &str) -> Option<&mut Memory> {
        self.memories.get_mut(event_id)
    }

    pub fn record(&mut self, event_id: impl Into<String>, memory: Memory) {
        self.memories.insert(event_id.into(), memory);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Memory)> {
        self.memories.iter()
    }

    /// Drops memories recorded below the given depth. Used when restoring a
    /// scenario to keep only the working set for the target depth.
    pub fn drop_below_depth(&mut self, min_depth: u32) {
        self.memories.retain(|_, memory| memory.depth >= min_depth);
    }

    /// Ranks the store against `query` and returns the top `k` memories,
    /// highest combined score first, ties broken by most recent event time.
    ///
    /// Missing embeddings are computed and cached here; nothing else is
    /// mutated. An empty store yields an empty list.
    pub fn retrieve(
        &mut self,
        query: &str,
        k: usize,
        now: FeedTimestamp,
        weights: &RetrievalConfig,
        embedder: &dyn EmbeddingOracle,
    ) -> Vec<Memory> {
        if k == 0 {
            return Vec::new();
        }
        self.rank(query, now, weights, embedder)
            .into_iter()
            .take(k)
            .map(|(_, memory)| memory)
            .collect()
    }

    /// Scores and sorts the full store against `query`, returning every
    /// memory paired with its combined score.
    fn rank(
        &mut self,
        query: &str,
        now: FeedTimestamp,
        weights: &RetrievalConfig,
        embedder: &dyn EmbeddingOracle,
    ) -> Vec<(f32, Memory)> {
        if self.memories.is_empty() {
            return Vec::new();
        }
        let query_embedding = embedder.embed(query);

        let mut recency = Vec::with_capacity(self.memories.len());
        let mut importance = Vec::with_capacity(self.memories.len());
        let mut relevance = Vec::with_capacity(self.memories.len());
        let mut emotion = Vec::with_capacity(self.memories.len());

        for memory in self.memories.values_mut() {
            let hours = now.hours_since(memory.event_time);
            recency.push((-weights.recency_decay_rate * hours).exp());
            importance.push(memory.importance as f32);
            let embedding = memory
                .embedding
                .get_or_insert_with(|| embedder.embed(&memory.content));
            relevance.push(cosine_similarity(embedding, &query_embedding));
            emotion.push(memory.emotion_intensity);
        }

        min_max_normalize(&mut recency);
        min_max_normalize(&mut importance);
        min_max_normalize(&mut relevance);
        min_max_normalize(&mut emotion);

        let mut ranked: Vec<(f32, Memory)> = self
            .memories
            .values()
            .enumerate()
            .map(|(i, memory)| {
                let score = weights.recency_weight * recency[i]
                    + weights.importance_weight * importance[i]
                    + weights.relevance_weight * relevance[i]
                    + weights.emotion_weight * emotion[i];
                (score, memory.clone())
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.event_time.cmp(&a.1.event_time))
        });

        ranked
    }
}

/// Zero-norm vectors score 0 rather than NaN.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Scales values into [0, 1] over their observed range. When the range is
/// zero (singleton or identical values) each value is clamped to [0, 1]
/// instead, so a lone memory still gets a sensible score.
fn min_max_normalize(values: &mut [f32]) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    for value in values.iter_mut() {
        *value = if range > 0.0 {
            (*value - min) / range
        } else {
            value.clamp(0.0, 1.0)
        };
    }
}
