//! Ephemeral "shout" broadcast: transient messages fanned out to the
//! room, rendered as short-lived elements that fade and disappear.
//!
//! Delivery is best-effort and at-most-once per connected peer, with no
//! acknowledgment, retry, ordering, or history. Self-echo is handled by
//! the publisher rendering locally at send time — the subscription never
//! loops our own messages back.
//!
//! Each rendered element owns an independent fade/remove timer pair keyed
//! to its own id, so rapid successive shouts never interfere with each
//! other's lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use agora_store::RoomHandle;

/// Shout wire-codec failures.
///
/// Clone so a failure can be logged at one layer and surfaced at another.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShoutError {
    #[error("shout encode failed: {0}")]
    Encode(String),
    #[error("shout decode failed: {0}")]
    Decode(String),
}

/// Topic name shouts travel on. One listener per topic per process;
/// registering a second listener double-renders incoming shouts.
pub const SHOUT_TOPIC: &str = "shout";

/// Horizontal placement margin: elements never start in the rightmost
/// band, leaving room for the text to run.
const X_MARGIN: f32 = 200.0;
/// Vertical placement margin.
const Y_MARGIN: f32 = 100.0;

/// Wire payload of one shout.
///
/// The placement fields carry the sender's local roll; receivers re-roll
/// against their own viewport so every screen gets an in-bounds position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoutMessage {
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees.
    pub angle: f32,
    /// Font size in pixels.
    pub size: f32,
}

impl ShoutMessage {
    /// Encode to binary (bincode).
    pub fn encode(&self) -> Result<Vec<u8>, ShoutError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ShoutError::Encode(e.to_string()))
    }

    /// Decode from binary.
    pub fn decode(bytes: &[u8]) -> Result<Self, ShoutError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ShoutError::Decode(e.to_string()))?;
        Ok(msg)
    }
}

/// Current viewport dimensions, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Roll a random in-bounds placement:
    /// `x ∈ [0, width-200)`, `y ∈ [0, height-100)`,
    /// `angle ∈ [-15, 15)` degrees, `size ∈ [24, 56)` px.
    pub fn placement(&self, rng: &mut impl Rng) -> Placement {
        Placement {
            x: rng.gen_range(0.0..(self.width - X_MARGIN).max(1.0)),
            y: rng.gen_range(0.0..(self.height - Y_MARGIN).max(1.0)),
            angle: rng.gen_range(-15.0..15.0),
            size: rng.gen_range(24.0..56.0),
        }
    }
}

/// One rolled screen placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub size: f32,
}

/// Visibility phase of a rendered shout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShoutPhase {
    Visible,
    /// Opacity transition toward zero has begun.
    Fading,
}

/// One transient on-screen element.
#[derive(Debug, Clone)]
pub struct ShoutElement {
    pub id: Uuid,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub size: f32,
    pub phase: ShoutPhase,
}

/// Fade/remove schedule for rendered shouts.
#[derive(Debug, Clone, Copy)]
pub struct StageTiming {
    /// Delay before the opacity transition starts.
    pub fade_after: Duration,
    /// Delay before the element is removed entirely.
    pub remove_after: Duration,
}

impl Default for StageTiming {
    fn default() -> Self {
        Self {
            fade_after: Duration::from_millis(100),
            remove_after: Duration::from_millis(2600),
        }
    }
}

/// Registry of transient shout elements with their lifecycle timers.
pub struct ShoutStage {
    viewport: RwLock<Viewport>,
    elements: Arc<Mutex<HashMap<Uuid, ShoutElement>>>,
    timing: StageTiming,
}

impl ShoutStage {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_timing(viewport, StageTiming::default())
    }

    pub fn with_timing(viewport: Viewport, timing: StageTiming) -> Self {
        Self {
            viewport: RwLock::new(viewport),
            elements: Arc::new(Mutex::new(HashMap::new())),
            timing,
        }
    }

    pub fn viewport(&self) -> Viewport {
        *self.viewport.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Track a viewport resize; only affects future placements.
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.write().unwrap_or_else(|e| e.into_inner()) = viewport;
    }

    /// Render a shout: roll a local placement, insert the element, and
    /// schedule its own fade/remove timer pair.
    ///
    /// Must be called from within a tokio runtime (the timers are
    /// detached tasks).
    pub fn render(&self, msg: &ShoutMessage) -> Uuid {
        let placement = self.viewport().placement(&mut rand::thread_rng());
        let id = Uuid::new_v4();
        let element = ShoutElement {
            id,
            text: msg.text.clone(),
            x: placement.x,
            y: placement.y,
            angle: placement.angle,
            size: placement.size,
            phase: ShoutPhase::Visible,
        };
        self.elements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, element);

        // Two independent timers, both keyed to this element only.
        let elements = self.elements.clone();
        let fade_after = self.timing.fade_after;
        tokio::spawn(async move {
            tokio::time::sleep(fade_after).await;
            if let Some(el) = elements
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get_mut(&id)
            {
                el.phase = ShoutPhase::Fading;
            }
        });

        let elements = self.elements.clone();
        let remove_after = self.timing.remove_after;
        tokio::spawn(async move {
            tokio::time::sleep(remove_after).await;
            elements
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
        });

        id
    }

    /// Snapshot of the currently rendered elements.
    pub fn elements(&self) -> Vec<ShoutElement> {
        self.elements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn element(&self, id: Uuid) -> Option<ShoutElement> {
        self.elements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Publish/subscribe endpoint for shouts in one room.
pub struct ShoutChannel {
    room: Arc<RoomHandle>,
    stage: Arc<ShoutStage>,
}

impl ShoutChannel {
    pub fn new(room: Arc<RoomHandle>, stage: Arc<ShoutStage>) -> Self {
        Self { room, stage }
    }

    pub fn stage(&self) -> &Arc<ShoutStage> {
        &self.stage
    }

    /// Publish a shout.
    ///
    /// The local echo renders immediately, before and independently of
    /// network fan-out: delivery latency or failure never delays or
    /// suppresses the sender's own view.
    pub fn publish(&self, text: impl Into<String>) -> ShoutMessage {
        let placement = self
            .stage
            .viewport()
            .placement(&mut rand::thread_rng());
        let msg = ShoutMessage {
            text: text.into(),
            x: placement.x,
            y: placement.y,
            angle: placement.angle,
            size: placement.size,
        };

        self.stage.render(&msg);

        match msg.encode() {
            Ok(bytes) => {
                let reached = self.room.publish(SHOUT_TOPIC, Arc::new(bytes));
                log::debug!("shout fanned out to {reached} receivers");
            }
            Err(err) => log::warn!("{err}"),
        }
        msg
    }

    /// Spawn the receive loop, rendering every incoming shout.
    ///
    /// Our own envelopes are skipped — the echo already rendered at send
    /// time. Only messages published after this call are delivered.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut rx = self.room.subscribe(SHOUT_TOPIC);
        let local = self.room.peer_id();
        let stage = self.stage.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if envelope.sender == local {
                            continue;
                        }
                        match ShoutMessage::decode(&envelope.payload) {
                            Ok(msg) => {
                                stage.render(&msg);
                            }
                            Err(err) => {
                                log::warn!("dropping malformed envelope: {err}");
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("shout listener lagged by {n} messages");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = ShoutMessage {
            text: "hi".into(),
            x: 120.0,
            y: 340.0,
            angle: -7.5,
            size: 32.0,
        };
        let encoded = msg.encode().unwrap();
        let decoded = ShoutMessage::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_garbage_yields_decode_error() {
        let err = ShoutMessage::decode(&[0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, ShoutError::Decode(_)));
        assert!(err.to_string().starts_with("shout decode failed"));
    }

    #[test]
    fn test_placement_bounds() {
        let viewport = Viewport::new(1000.0, 800.0);
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let p = viewport.placement(&mut rng);
            assert!((0.0..800.0).contains(&p.x), "x out of bounds: {}", p.x);
            assert!((0.0..700.0).contains(&p.y), "y out of bounds: {}", p.y);
            assert!((-15.0..15.0).contains(&p.angle));
            assert!((24.0..56.0).contains(&p.size));
        }
    }

    #[test]
    fn test_placement_tiny_viewport_stays_non_negative() {
        let viewport = Viewport::new(100.0, 50.0);
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let p = viewport.placement(&mut rng);
            assert!(p.x >= 0.0 && p.x < 1.0);
            assert!(p.y >= 0.0 && p.y < 1.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_fades_then_disappears() {
        let stage = ShoutStage::new(Viewport::new(1000.0, 800.0));
        let id = stage.render(&ShoutMessage {
            text: "hey".into(),
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            size: 30.0,
        });

        assert_eq!(stage.element(id).unwrap().phase, ShoutPhase::Visible);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(stage.element(id).unwrap().phase, ShoutPhase::Fading);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(stage.element(id).is_none());
        assert!(stage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_shouts_have_independent_lifecycles() {
        let stage = ShoutStage::new(Viewport::new(1000.0, 800.0));
        let msg = ShoutMessage {
            text: "x".into(),
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            size: 30.0,
        };

        let first = stage.render(&msg);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        let second = stage.render(&msg);

        // First is old and fading; second is fresh.
        assert_eq!(stage.element(first).unwrap().phase, ShoutPhase::Fading);
        assert_eq!(stage.element(second).unwrap().phase, ShoutPhase::Visible);

        // First expires on its own clock; second remains.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(stage.element(first).is_none());
        assert!(stage.element(second).is_some());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(stage.is_empty());
    }

    #[tokio::test]
    async fn test_set_viewport_affects_future_placements() {
        let stage = ShoutStage::new(Viewport::new(1000.0, 800.0));
        stage.set_viewport(Viewport::new(300.0, 200.0));

        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let p = stage.viewport().placement(&mut rng);
            assert!(p.x < 100.0);
            assert!(p.y < 100.0);
        }
    }
}
