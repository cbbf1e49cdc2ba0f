//! Pub/sub fan-out for `scene:<id>:updates` / `scene:<id>:awareness`
//! topics (spec §6, §9 "Redis-like pub/sub channels ... each subscriber
//! holds a bounded callback queue and must drop the oldest on
//! overflow").
//!
//! `tokio::sync::broadcast` lags (drops the *reader*, surfacing a
//! `Lagged` error) rather than dropping the oldest queued item, so this
//! is a purpose-built ring buffer over a shared queue + `Notify` instead.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

const SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct RingBuffer {
    queue: Mutex<VecDeque<TopicEvent>>,
    notify: Notify,
}

impl RingBuffer {
    fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::with_capacity(SUBSCRIBER_CAPACITY)), notify: Notify::new() }
    }

    fn push(&self, event: TopicEvent) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= SUBSCRIBER_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }
}

/// Handle a subscriber polls to receive events, oldest first, with the
/// oldest silently dropped if the publisher outpaces it past capacity.
pub struct Subscription {
    buffer: Arc<RingBuffer>,
}

impl Subscription {
    pub async fn recv(&self) -> TopicEvent {
        loop {
            if let Some(event) = self.buffer.queue.lock().unwrap().pop_front() {
                return event;
            }
            self.buffer.notify.notified().await;
        }
    }
}

#[derive(Default)]
struct Topic {
    subscribers: Vec<std::sync::Weak<RingBuffer>>,
}

#[derive(Default)]
pub struct PubSub {
    topics: Mutex<HashMap<String, Topic>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let buffer = Arc::new(RingBuffer::new());
        let mut topics = self.topics.lock().unwrap();
        topics.entry(topic.to_string()).or_default().subscribers.push(Arc::downgrade(&buffer));
        Subscription { buffer }
    }

    /// Publishes to every live subscriber of `topic`, dropping each
    /// subscriber's oldest buffered event on overflow rather than
    /// blocking or dropping the publish.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) {
        let mut topics = self.topics.lock().unwrap();
        let Some(entry) = topics.get_mut(topic) else {
            return;
        };
        let event = TopicEvent { topic: topic.to_string(), payload };
        entry.subscribers.retain(|weak| match weak.upgrade() {
            Some(buffer) => {
                buffer.push(event.clone());
                true
            }
            None => false,
        });
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(topic)
            .map(|t| t.subscribers.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

pub fn scene_updates_topic(scene_id: &str) -> String {
    format!("scene:{scene_id}:updates")
}

pub fn scene_awareness_topic(scene_id: &str) -> String {
    format!("scene:{scene_id}:awareness")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let pubsub = PubSub::new();
        let sub = pubsub.subscribe("scene:1:updates");
        pubsub.publish("scene:1:updates", b"hello".to_vec());
        let event = sub.recv().await;
        assert_eq!(event.payload, b"hello");
    }

    #[tokio::test]
    async fn publish_to_unknown_topic_is_a_no_op() {
        let pubsub = PubSub::new();
        pubsub.publish("scene:none:updates", b"x".to_vec());
    }

    #[tokio::test]
    async fn overflow_drops_oldest_not_newest() {
        let pubsub = PubSub::new();
        let sub = pubsub.subscribe("scene:1:updates");
        for i in 0..(SUBSCRIBER_CAPACITY + 10) {
            pubsub.publish("scene:1:updates", vec![i as u8]);
        }
        let first = sub.recv().await;
        assert_eq!(first.payload, vec![10]);
    }

    #[tokio::test]
    async fn dropped_subscription_is_removed_from_the_topic() {
        let pubsub = PubSub::new();
        let sub = pubsub.subscribe("scene:1:updates");
        assert_eq!(pubsub.subscriber_count("scene:1:updates"), 1);
        drop(sub);
        pubsub.publish("scene:1:updates", b"x".to_vec());
        assert_eq!(pubsub.subscriber_count("scene:1:updates"), 0);
    }
}
