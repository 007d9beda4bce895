//! Messages and the shared message log.
//!
//! A [`Message`] is one posted or replied unit in the shared feed. Messages
//! are only ever mutated by [`Message::like`]; removal happens exclusively
//! through depth-based trimming on restore.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::timestamp::FeedTimestamp;

/// Maximum reply-chain hops walked before giving up (cycle guard).
const MAX_CHAIN_HOPS: usize = 64;

/// Generates a message id from content, post time and a random salt.
///
/// The id is practically unique, not cryptographically guaranteed unique;
/// callers that need true uniqueness re-salt against the existing log.
pub fn generate_message_id(content: &str, time: FeedTimestamp, rng: &mut impl Rng) -> String {
    let salt: u64 = rng.gen();
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    time.minutes().hash(&mut hasher);
    salt.hash(&mut hasher);
    format!("msg_{:016x}", hasher.finish())
}

/// A posted or replied unit in the shared feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub content: String,
    /// Name of the posting agent.
    pub author: String,
    /// When the message was posted.
    pub post_time: FeedTimestamp,
    /// Agents that liked this message; each appears at most once.
    #[serde(default)]
    pub likes: Vec<String>,
    /// Opaque hash id.
    pub id: String,
    /// Id of the message this replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Propagation depth of the round that produced this message.
    /// Assigned at creation, immutable thereafter.
    pub depth: u32,
}

impl Message {
    /// Creates a fresh (non-reply) message.
    pub fn new(
        content: impl Into<String>,
        author: impl Into<String>,
        post_time: FeedTimestamp,
        id: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
            post_time,
            likes: Vec::new(),
            id: id.into(),
            reply_to_id: None,
            depth,
        }
    }

    /// Marks this message as a reply to `parent_id`.
    pub fn with_reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.reply_to_id = Some(parent_id.into());
        self
    }

    /// Registers a like by `agent`. Idempotent set-add.
    pub fn like(&mut self, agent: &str) {
        if !self.likes.iter().any(|a| a == agent) {
            self.likes.push(agent.to_string());
        }
    }
}

/// Reply linkage for a message in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    /// Author of the message itself.
    pub author: String,
    /// Parent message id, if the message is a reply.
    pub parent_id: Option<String>,
}

/// The shared, append-only message log.
///
/// Owned by the scheduler; agents receive it through a narrow capability
/// context and may only read it, append to it, and register likes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the log holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a message to the log.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Looks up a message by id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Returns whether an id is present in the log.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Registers a like on the message with the given id.
    ///
    /// Returns false when the id is unknown; a missing target is a degraded
    /// condition, not an error.
    pub fn like(&mut self, id: &str, agent: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.like(agent);
                true
            }
            None => {
                tracing::debug!(message_id = id, agent, "like target not in log");
                false
            }
        }
    }

    /// Returns the author and parent linkage for a message id.
    ///
    /// A reply whose parent id is absent from the log is tolerated: the
    /// linkage still reports the parent id and the caller treats the reply
    /// as unparented.
    pub fn reply_context(&self, id: &str) -> Option<ReplyContext> {
        self.get(id).map(|m| ReplyContext {
            author: m.author.clone(),
            parent_id: m.reply_to_id.clone(),
        })
    }

    /// Walks the reply chain upward from `id`'s parent and returns true if
    /// any message in the chain was authored by `agent`.
    ///
    /// Dangling parent references end the walk (degraded read); a visited
    /// set plus a hop cap guard against malformed cyclic chains.
    pub fn chain_reaches_author(&self, id: &str, agent: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = match self.get(id).and_then(|m| m.reply_to_id.clone()) {
            Some(parent) => parent,
            None => return false,
        };

        for _ in 0..MAX_CHAIN_HOPS {
            if !visited.insert(current.clone()) {
                return false;
            }
            let Some(message) = self.get(&current) else {
                tracing::warn!(message_id = %current, "reply chain hit missing parent");
                return false;
            };
            if message.author == agent {
                return true;
            }
            match &message.reply_to_id {
                Some(parent) => current = parent.clone(),
                None => return false,
            }
        }
        false
    }

    /// Drops every message with `depth < min_depth`.
    ///
    /// Applied on restore as the working-set bound.
    pub fn drop_below_depth(&mut self, min_depth: u32) {
        self.messages.retain(|m| m.depth >= min_depth);
    }

    /// Iterates messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ts(minute: u64) -> FeedTimestamp {
        FeedTimestamp::from_minutes(minute)
    }

    #[test]
    fn test_like_is_idempotent() {
        let mut message = Message::new("hello", "mara", ts(0), "msg_1", 0);
        message.like("oren");
        message.like("oren");
        message.like("liv");
        assert_eq!(message.likes, vec!["oren".to_string(), "liv".to_string()]);
    }

    #[test]
    fn test_generate_message_id_salted() {
        let mut rng = SmallRng::seed_from_u64(1);
        let a = generate_message_id("same text", ts(10), &mut rng);
        let b = generate_message_id("same text", ts(10), &mut rng);
        assert!(a.starts_with("msg_"));
        assert_ne!(a, b, "salt should differentiate identical content+time");
    }

    #[test]
    fn test_log_append_and_get() {
        let mut log = MessageLog::new();
        log.append(Message::new("first", "mara", ts(0), "msg_1", 0));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get("msg_1").unwrap().content, "first");
        assert!(log.get("msg_2").is_none());
    }

    #[test]
    fn test_log_like_missing_target() {
        let mut log = MessageLog::new();
        assert!(!log.like("msg_missing", "oren"));

        log.append(Message::new("first", "mara", ts(0), "msg_1", 0));
        assert!(log.like("msg_1", "oren"));
        assert_eq!(log.get("msg_1").unwrap().likes, vec!["oren".to_string()]);
    }

    #[test]
    fn test_reply_context() {
        let mut log = MessageLog::new();
        log.append(Message::new("root", "mara", ts(0), "msg_1", 0));
        log.append(Message::new("re", "oren", ts(5), "msg_2", 0).with_reply_to("msg_1"));

        let ctx = log.reply_context("msg_2").unwrap();
        assert_eq!(ctx.author, "oren");
        assert_eq!(ctx.parent_id.as_deref(), Some("msg_1"));

        let root = log.reply_context("msg_1").unwrap();
        assert!(root.parent_id.is_none());
    }

    #[test]
    fn test_chain_reaches_author() {
        let mut log = MessageLog::new();
        log.append(Message::new("root", "mara", ts(0), "msg_1", 0));
        log.append(Message::new("re", "oren", ts(5), "msg_2", 0).with_reply_to("msg_1"));
        log.append(Message::new("re re", "liv", ts(9), "msg_3", 0).with_reply_to("msg_2"));

        // Chain from msg_3 passes through oren's reply and mara's root.
        assert!(log.chain_reaches_author("msg_3", "mara"));
        assert!(log.chain_reaches_author("msg_3", "oren"));
        assert!(!log.chain_reaches_author("msg_3", "liv"));
        // A root message has no chain.
        assert!(!log.chain_reaches_author("msg_1", "mara"));
    }

    #[test]
    fn test_chain_with_dangling_parent() {
        let mut log = MessageLog::new();
        log.append(Message::new("orphan reply", "oren", ts(5), "msg_2", 0).with_reply_to("msg_gone"));
        // Degraded read: the walk just ends.
        assert!(!log.chain_reaches_author("msg_2", "mara"));
    }

    #[test]
    fn test_chain_with_cycle() {
        let mut log = MessageLog::new();
        log.append(Message::new("a", "mara", ts(0), "msg_a", 0).with_reply_to("msg_b"));
        log.append(Message::new("b", "oren", ts(1), "msg_b", 0).with_reply_to("msg_a"));
        // Malformed cyclic chain terminates without finding an outside author.
        assert!(!log.chain_reaches_author("msg_a", "liv"));
    }

    #[test]
    fn test_drop_below_depth() {
        let mut log = MessageLog::new();
        log.append(Message::new("old", "mara", ts(0), "msg_1", 1));
        log.append(Message::new("current", "oren", ts(5), "msg_2", 3));
        log.drop_below_depth(3);

        assert_eq!(log.len(), 1);
        assert_eq!(log.get("msg_2").unwrap().content, "current");
    }

    #[test]
    fn test_log_serde_roundtrip() {
        let mut log = MessageLog::new();
        let mut message = Message::new("root", "mara", ts(42), "msg_1", 2);
        message.like("oren");
        log.append(message);
        log.append(Message::new("re", "oren", ts(47), "msg_2", 2).with_reply_to("msg_1"));

        let json = serde_json::to_string(&log).unwrap();
        let restored: MessageLog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, log);
    }
}
