//! Online-peer count derived from a room's presence roster.
//!
//! Peer identity is connection-scoped: two tabs of one user count as two.
//! The roster is purely a function of currently-open connections; teardown
//! detection belongs to the store, not this layer.

use agora_store::{PeerId, RoomHandle};
use tokio::sync::watch;

/// Tracks how many peers are online in one room.
pub struct PresenceTracker {
    local: PeerId,
    roster: watch::Receiver<Vec<PeerId>>,
}

impl PresenceTracker {
    pub fn new(room: &RoomHandle) -> Self {
        Self {
            local: room.peer_id(),
            roster: room.roster(),
        }
    }

    /// `1 + |remote peers|`: ourselves plus everyone else in the roster.
    ///
    /// Computed by excluding the local peer id rather than counting the
    /// roster directly, so the count stays right even if the roster
    /// snapshot races our own join or leave.
    pub fn online_count(&self) -> usize {
        1 + self
            .roster
            .borrow()
            .iter()
            .filter(|p| **p != self.local)
            .count()
    }

    /// Wait for the next roster change.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.roster.changed().await
    }

    /// Derived live stream of the online count.
    pub fn watch_count(&self) -> watch::Receiver<usize> {
        let (tx, rx) = watch::channel(self.online_count());
        let local = self.local;
        let mut roster = self.roster.clone();
        tokio::spawn(async move {
            while roster.changed().await.is_ok() {
                let count = 1 + roster.borrow().iter().filter(|p| **p != local).count();
                if tx.send(count).is_err() {
                    break;
                }
            }
        });
        rx
    }
}
