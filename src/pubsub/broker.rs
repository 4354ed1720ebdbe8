//! Channel subscriptions and message fan-out

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::debug;

pub type SessionId = u64;

/// A message delivered to a subscribed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub channel: String,
    pub payload: String,
}

/// Per-connection subscription state and delivery queue. Created on connect,
/// torn down via `Broker::disconnect` when the connection goes away.
pub struct Session {
    id: SessionId,
    channels: HashSet<String>,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
}

impl Session {
    /// Next delivered event, in publish order per channel. Suspends until
    /// one arrives.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Number of channels this session is currently subscribed to.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_subscribed(&self) -> bool {
        !self.channels.is_empty()
    }
}

/// Fan-out hub. A channel exists only as its current subscriber set; a
/// publish enqueues on every subscriber queue registered at that instant and
/// is never buffered or replayed.
pub struct Broker {
    channels: Mutex<HashMap<String, HashMap<SessionId, UnboundedSender<Event>>>>,
    next_id: AtomicU64,
}

impl Broker {
    pub fn new() -> Self {
        Broker {
            channels: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a session with an empty subscription set and a fresh queue.
    pub fn session(&self) -> Session {
        let (tx, rx) = mpsc::unbounded_channel();
        Session {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            channels: HashSet::new(),
            tx,
            rx,
        }
    }

    /// Add the session to a channel. Repeat subscriptions are no-ops.
    pub async fn subscribe(&self, session: &mut Session, channel: &str) {
        if !session.channels.insert(channel.to_string()) {
            return;
        }

        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(session.id, session.tx.clone());
        debug!("session {} subscribed to '{}'", session.id, channel);
    }

    /// Remove the session from the named channels, or from all of them when
    /// `names` is empty.
    pub async fn unsubscribe(&self, session: &mut Session, names: &[String]) {
        let targets: Vec<String> = if names.is_empty() {
            session.channels.drain().collect()
        } else {
            let mut removed = Vec::new();
            for name in names {
                if session.channels.remove(name) {
                    removed.push(name.clone());
                }
            }
            removed
        };

        if targets.is_empty() {
            return;
        }

        let mut channels = self.channels.lock().await;
        for name in &targets {
            remove_subscriber(&mut channels, name, session.id);
        }
        debug!("session {} unsubscribed from {:?}", session.id, targets);
    }

    /// Drop every subscription the session holds. Called when its
    /// connection closes, on any exit path.
    pub async fn disconnect(&self, session: &Session) {
        if session.channels.is_empty() {
            return;
        }

        let mut channels = self.channels.lock().await;
        for name in &session.channels {
            remove_subscriber(&mut channels, name, session.id);
        }
        debug!("session {} disconnected", session.id);
    }

    /// Enqueue the payload for everyone subscribed to the channel right now;
    /// returns how many subscriber queues accepted it. Holding the table
    /// lock across the sends keeps publishes to one channel in the same
    /// order on every subscriber queue.
    pub async fn publish(&self, channel: &str, payload: &str) -> usize {
        let channels = self.channels.lock().await;
        let subscribers = match channels.get(channel) {
            Some(subscribers) => subscribers,
            None => return 0,
        };

        let mut delivered = 0;
        for tx in subscribers.values() {
            let event = Event {
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            if tx.send(event).is_ok() {
                delivered += 1;
            }
        }
        debug!("published to '{}', {} recipients", channel, delivered);
        delivered
    }
}

impl Default for Broker {
    fn default() -> Self {
        Broker::new()
    }
}

fn remove_subscriber(
    channels: &mut HashMap<String, HashMap<SessionId, UnboundedSender<Event>>>,
    name: &str,
    id: SessionId,
) {
    let now_empty = match channels.get_mut(name) {
        Some(subscribers) => {
            subscribers.remove(&id);
            subscribers.is_empty()
        }
        None => false,
    };
    if now_empty {
        channels.remove(name);
    }
}
