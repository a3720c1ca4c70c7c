//! Room-scoped presence rosters and topic broadcast.
//!
//! A room is a named scope holding a live roster of connected peers and a
//! set of named topics. Topic fan-out uses tokio broadcast channels with
//! pre-encoded `Arc<Vec<u8>>` payloads, which gives exactly the ephemeral
//! contract the application needs: best-effort, at-most-once per connected
//! subscriber, no ordering across peers, and no history (a subscriber that
//! joins after a publish never sees it).
//!
//! Presence entries live as long as their [`RoomHandle`]: dropping the
//! handle removes the peer from the roster and republishes it. Production
//! stores detect teardown via heartbeat timeouts instead; that mechanism is
//! outside this core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{broadcast, watch};

use crate::types::PeerId;

/// Default per-topic channel capacity (messages buffered per receiver).
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// One fan-out message on a topic.
///
/// Payloads are pre-encoded bytes behind an `Arc` so a single publish
/// never re-serializes per peer.
#[derive(Debug, Clone)]
pub struct TopicEnvelope {
    /// Connection-scoped id of the publishing peer.
    pub sender: PeerId,
    pub payload: Arc<Vec<u8>>,
}

/// Shared per-room state: roster plus topic channels.
pub struct RoomCore {
    name: String,
    peers: Mutex<Vec<PeerId>>,
    roster_tx: watch::Sender<Vec<PeerId>>,
    topics: RwLock<HashMap<String, broadcast::Sender<TopicEnvelope>>>,
    capacity: usize,
}

impl RoomCore {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (roster_tx, _) = watch::channel(Vec::new());
        Self {
            name: name.into(),
            peers: Mutex::new(Vec::new()),
            roster_tx,
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join this room under a fresh connection-scoped peer id.
    pub fn join(self: &Arc<Self>) -> RoomHandle {
        let peer_id = PeerId::new();
        {
            let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
            peers.push(peer_id);
            self.roster_tx.send_replace(peers.clone());
        }
        log::debug!("peer {peer_id} joined room {}", self.name);
        RoomHandle {
            peer_id,
            room: self.clone(),
        }
    }

    /// Current number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Subscribe to roster updates without joining.
    pub fn roster(&self) -> watch::Receiver<Vec<PeerId>> {
        self.roster_tx.subscribe()
    }

    fn leave(&self, peer_id: PeerId) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.retain(|p| *p != peer_id);
        self.roster_tx.send_replace(peers.clone());
        log::debug!("peer {peer_id} left room {}", self.name);
    }

    /// Get or create the broadcast channel for a topic.
    fn topic_sender(&self, topic: &str) -> broadcast::Sender<TopicEnvelope> {
        // Fast path: read lock.
        {
            let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = topics.get(topic) {
                return tx.clone();
            }
        }
        // Slow path: write lock, double-checked.
        let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = topics.get(topic) {
            return tx.clone();
        }
        let (tx, _) = broadcast::channel(self.capacity);
        topics.insert(topic.to_string(), tx.clone());
        tx
    }
}

/// A live connection to a room: presence entry plus publish/subscribe.
///
/// Dropping the handle removes the presence entry.
pub struct RoomHandle {
    peer_id: PeerId,
    room: Arc<RoomCore>,
}

impl RoomHandle {
    /// This connection's roster identity.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn room_name(&self) -> &str {
        self.room.name()
    }

    /// Live roster of connected peers, local peer included.
    pub fn roster(&self) -> watch::Receiver<Vec<PeerId>> {
        self.room.roster()
    }

    /// Fan a pre-encoded payload out to every topic subscriber.
    ///
    /// Returns the number of receivers the message reached (the local
    /// subscriber, if any, is among them; filtering own messages is the
    /// subscriber's job). Zero receivers is not an error.
    pub fn publish(&self, topic: &str, payload: Arc<Vec<u8>>) -> usize {
        let tx = self.room.topic_sender(topic);
        tx.send(TopicEnvelope {
            sender: self.peer_id,
            payload,
        })
        .unwrap_or(0)
    }

    /// Subscribe to a topic. Only messages published after this call are
    /// delivered.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TopicEnvelope> {
        self.room.topic_sender(topic).subscribe()
    }
}

impl Drop for RoomHandle {
    fn drop(&mut self) {
        self.room.leave(self.peer_id);
    }
}

/// Maps room names to live room cores.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<String, Arc<RoomCore>>>,
    default_capacity: usize,
}

impl RoomDirectory {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            default_capacity,
        }
    }

    /// Get or create the room with the given name.
    pub fn get_or_create(&self, name: &str) -> Arc<RoomCore> {
        {
            let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
            if let Some(room) = rooms.get(name) {
                return room.clone();
            }
        }
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        if let Some(room) = rooms.get(name) {
            return room.clone();
        }
        let room = Arc::new(RoomCore::new(name, self.default_capacity));
        rooms.insert(name.to_string(), room.clone());
        room
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}
