/*!
 * # Message Queue
 *
 * Topic-based queue used by the request/reply consumers. A request carries a
 * `correlation_id` and a `reply_to` topic; the consumer publishes its answer
 * with [`Message::reply`], which copies both so the caller can match it up.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Message queue errors
#[derive(Error, Debug)]
pub enum MessageQueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Unknown message: {0}")]
    UnknownMessage(Uuid),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Message envelope for queue items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    #[serde(default)]
    pub reply_to: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: chrono::Utc::now(),
            correlation_id: None,
            reply_to: None,
            retry_count: 0,
            max_retries: 3,
        }
    }

    /// Builds a request that expects an answer on `reply_to`.
    pub fn request(
        topic: impl Into<String>,
        reply_to: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let mut message = Self::new(topic, payload);
        message.correlation_id = Some(message.id);
        message.reply_to = Some(reply_to.into());
        message
    }

    /// Builds the answer to this message. It goes to `reply_to`, or to
    /// `default_topic` when the sender did not name one.
    pub fn reply(&self, default_topic: &str, payload: serde_json::Value) -> Message {
        let topic = self
            .reply_to
            .clone()
            .unwrap_or_else(|| default_topic.to_string());
        let mut reply = Message::new(topic, payload);
        reply.correlation_id = Some(self.correlation_id.unwrap_or(self.id));
        reply
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Message queue trait for different implementations
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError>;
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError>;
    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
}

#[derive(Debug, Default)]
struct QueueState {
    topics: HashMap<String, VecDeque<Message>>,
    in_flight: HashMap<Uuid, Message>,
}

/// In-memory message queue implementation.
///
/// Delivered messages stay in flight until acked. A nack puts the message back
/// at the head of its topic while it still has retries left, otherwise it is
/// dropped.
#[derive(Debug, Clone)]
pub struct InMemoryMessageQueue {
    state: Arc<Mutex<QueueState>>,
    max_size: usize,
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::with_max_size(1000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            max_size,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, MessageQueueError> {
        self.state
            .lock()
            .map_err(|_| MessageQueueError::ConnectionError("queue state poisoned".into()))
    }

    /// Number of messages waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.lock()
            .map(|state| state.topics.get(topic).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Number of delivered messages not yet acked or nacked.
    pub fn in_flight(&self) -> usize {
        self.lock().map(|state| state.in_flight.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let mut state = self.lock()?;
        let queue = state.topics.entry(message.topic.clone()).or_default();

        if queue.len() >= self.max_size {
            return Err(MessageQueueError::QueueFull);
        }

        queue.push_back(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut state = self.lock()?;
        let next = state.topics.get_mut(topic).and_then(VecDeque::pop_front);
        if let Some(message) = &next {
            state.in_flight.insert(message.id, message.clone());
        }
        Ok(next)
    }

    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        let mut state = self.lock()?;
        state
            .in_flight
            .remove(message_id)
            .map(|_| ())
            .ok_or(MessageQueueError::UnknownMessage(*message_id))
    }

    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        let mut state = self.lock()?;
        let mut message = state
            .in_flight
            .remove(message_id)
            .ok_or(MessageQueueError::UnknownMessage(*message_id))?;

        if message.can_retry() {
            message.retry_count += 1;
            state
                .topics
                .entry(message.topic.clone())
                .or_default()
                .push_front(message);
        } else {
            tracing::warn!(message_id = %message.id, topic = %message.topic, "dropping message after max retries");
        }
        Ok(())
    }
}
