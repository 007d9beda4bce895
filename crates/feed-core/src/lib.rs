//! Emergent Feed Simulation Engine
//!
//! Drives a small society of memory-bearing agents around a shared message
//! feed. Events propagate in depth-bounded rounds: each round delivers
//! pending events to every online agent, agents appraise them into
//! memories, maybe like, maybe reflect, and maybe post, and their posts
//! become the next round's events.
//!
//! State is scenario-scoped and file-backed (see [`persistence`]); the
//! oracles that supply judgment and language are injected behind traits
//! (see [`oracle`]) so runs are reproducible offline.

pub mod agent;
pub mod config;
pub mod memory;
pub mod oracle;
pub mod persistence;
pub mod scheduler;
pub mod setup;

pub use agent::{Agent, Feeling, Persona, Reaction, TurnCtx};
pub use config::{ConfigError, SimConfig};
pub use memory::{Memory, MemoryStore};
pub use oracle::{EmbeddingOracle, HashEmbedder, OfflineOracle, ScriptedOracle, TextOracle};
pub use persistence::{
    advance_simulation, inject_message, scenario_key, PersistenceError, ScenarioStore,
};
pub use scheduler::{RoundSummary, Simulation};
