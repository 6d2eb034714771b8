//! # Pub/Sub Gateway
//!
//! Process-wide map of topics to subscribed sessions.
//!
//! The gateway consumes the application [`EventBus`] and publishes every
//! [`CoreEvent`](core_runtime::events::CoreEvent) to the topic it belongs
//! to. A subscriber whose connection is gone is detected on the first
//! failed write and removed from every topic, publishing then goes on with
//! the remaining subscribers.

use bytes::Bytes;
use core_runtime::events::{EventBus, ALL_TOPICS};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, ServiceError};
use crate::protocol::topic_frame;
use crate::session::SessionOptions;

/// Write side of a session, as seen by the gateway.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: u64,
    options: Arc<Mutex<SessionOptions>>,
    outbox: UnboundedSender<Bytes>,
}

impl Subscriber {
    pub fn new(id: u64, options: Arc<Mutex<SessionOptions>>, outbox: UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            options,
            outbox,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a frame on the session outbox. Fails when the session is dead.
    ///
    /// A session only looks dead once its writer task has dropped the
    /// receiving end, so the first frame after a peer reset is still queued
    /// and counted as delivered. The session's own EOF handling unlinks it
    /// in the usual case; a failed write ends the writer and the next
    /// publish unlinks it otherwise.
    fn write_topic_msg(&self, topic: &str, body: &str) -> std::result::Result<(), DeadSubscriber> {
        if self.outbox.is_closed() {
            return Err(DeadSubscriber);
        }
        let version = self.options.lock().pubsub_version;
        self.outbox
            .send(topic_frame(topic, body, version))
            .map_err(|_| DeadSubscriber)
    }
}

#[derive(Debug)]
struct DeadSubscriber;

#[derive(Default)]
struct GatewayState {
    topics: BTreeSet<String>,
    relations: HashMap<String, Vec<Subscriber>>,
}

#[derive(Default)]
pub struct Gateway {
    state: Mutex<GatewayState>,
}

impl Gateway {
    /// A gateway knowing every application topic.
    pub fn new() -> Self {
        let gateway = Self::default();
        for topic in ALL_TOPICS {
            gateway.add_topic(topic);
        }
        gateway
    }

    pub fn add_topic(&self, topic: &str) {
        self.state.lock().topics.insert(topic.to_string());
    }

    pub fn remove_topic(&self, topic: &str) {
        let mut state = self.state.lock();
        state.topics.remove(topic);
        state.relations.remove(topic);
    }

    pub fn topics(&self) -> Vec<String> {
        self.state.lock().topics.iter().cloned().collect()
    }

    /// Subscribe `subscriber` to `topic`. Linking twice is a no-op.
    pub fn link(&self, topic: &str, subscriber: Subscriber) -> Result<()> {
        let mut state = self.state.lock();
        if !state.topics.contains(topic) {
            return Err(ServiceError::handler(format!("topic '{topic}' not found")));
        }
        let subscribers = state.relations.entry(topic.to_string()).or_default();
        if !subscribers.iter().any(|s| s.id == subscriber.id) {
            subscribers.push(subscriber);
        }
        Ok(())
    }

    /// Link every topic matched by `pattern`, anchored at the start like a
    /// prefix match. Returns the linked topics.
    pub fn link_matching(&self, pattern: &str, subscriber: &Subscriber) -> Result<Vec<String>> {
        let re = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|err| ServiceError::handler(format!("invalid topic pattern: {err}")))?;
        let matched: Vec<String> = self
            .topics()
            .into_iter()
            .filter(|topic| re.is_match(topic))
            .collect();
        for topic in &matched {
            self.link(topic, subscriber.clone())?;
        }
        Ok(matched)
    }

    pub fn unlink(&self, topic: &str, subscriber_id: u64) {
        if let Some(subscribers) = self.state.lock().relations.get_mut(topic) {
            subscribers.retain(|s| s.id != subscriber_id);
        }
    }

    /// Drop the subscriber from every topic.
    pub fn remove_subscriber(&self, subscriber_id: u64) {
        let mut state = self.state.lock();
        for subscribers in state.relations.values_mut() {
            subscribers.retain(|s| s.id != subscriber_id);
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .relations
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Topics `subscriber_id` is linked to.
    pub fn topics_of(&self, subscriber_id: u64) -> Vec<String> {
        let state = self.state.lock();
        let mut topics: Vec<String> = state
            .relations
            .iter()
            .filter(|(_, subs)| subs.iter().any(|s| s.id == subscriber_id))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    /// Send `body` to every subscriber of `topic`. Returns how many outboxes
    /// accepted the frame; subscribers found dead are unlinked from every
    /// topic.
    pub fn publish(&self, topic: &str, body: &str) -> usize {
        let subscribers = match self.state.lock().relations.get(topic) {
            Some(subscribers) => subscribers.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for subscriber in &subscribers {
            match subscriber.write_topic_msg(topic, body) {
                Ok(()) => delivered += 1,
                Err(DeadSubscriber) => dead.push(subscriber.id),
            }
        }
        for id in dead {
            info!(subscriber = id, "Removing dead subscriber");
            self.remove_subscriber(id);
        }
        delivered
    }

    /// Publish every event of `events` until the bus is dropped.
    pub fn spawn_pump(self: &Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let mut receiver = events.subscribe();
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let topic = event.topic();
                        let delivered = gateway.publish(topic, &event.payload());
                        trace!(topic, delivered, "{}", event.description());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Pub/sub gateway lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event bus closed, pub/sub pump stopped");
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Gateway")
            .field("topics", &state.topics.len())
            .field(
                "subscriptions",
                &state.relations.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
