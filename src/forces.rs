//! Pending point-force queue.
//!
//! Input handlers and scripted drivers append forces at any time; the
//! engine drains the whole queue exactly once at the start of the next
//! rendered frame. The queue is the only shared-mutable boundary between
//! producers and the frame loop, so appends and drains are serialized with
//! a mutex: each entry is consumed exactly once even if a producer runs on
//! another thread. Drain order is not significant; forces are additive
//! point injections.

use std::sync::Mutex;

/// A force/color injection at a normalized position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointForce {
    /// Horizontal position in `[0, 1]`, measured from the left edge.
    pub x: f32,
    /// Vertical position in `[0, 1]`, measured from the bottom edge.
    pub y: f32,
    /// Velocity delta, pre-clamped by callers to `[-0.05, 0.05]`.
    pub vx: f32,
    /// Velocity delta, pre-clamped by callers to `[-0.05, 0.05]`.
    pub vy: f32,
    /// Dye color, one byte per channel.
    pub color: [u8; 3],
}

/// Multi-producer, single-consumer force queue.
///
/// Created once per engine; only ever appended to and drained, never
/// replaced. Empty at rest.
#[derive(Debug, Default)]
pub struct ForceQueue {
    pending: Mutex<Vec<PointForce>>,
}

impl ForceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a force. Non-blocking apart from the queue lock.
    pub fn push(&self, force: PointForce) {
        self.pending.lock().expect("force queue poisoned").push(force);
    }

    /// Take every pending force, leaving the queue empty.
    ///
    /// Forces pushed while the returned batch is being processed land in
    /// the next frame's drain; nothing is lost or consumed twice.
    pub fn drain(&self) -> Vec<PointForce> {
        std::mem::take(&mut *self.pending.lock().expect("force queue poisoned"))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().expect("force queue poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn force(x: f32) -> PointForce {
        PointForce {
            x,
            y: 0.5,
            vx: 0.01,
            vy: -0.01,
            color: [255, 128, 0],
        }
    }

    #[test]
    fn test_drain_consumes_exactly_once() {
        let queue = ForceQueue::new();
        for i in 0..7 {
            queue.push(force(i as f32 / 7.0));
        }
        let drained = queue.drain();
        assert_eq!(drained.len(), 7);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_push_during_drain_survives_to_next_frame() {
        let queue = ForceQueue::new();
        queue.push(force(0.1));
        let first = queue.drain();
        // Simulates a producer firing while the frame consumes `first`.
        queue.push(force(0.9));
        assert_eq!(first.len(), 1);
        let second = queue.drain();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].x, 0.9);
    }

    #[test]
    fn test_concurrent_producers() {
        use std::sync::Arc;

        let queue = Arc::new(ForceQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.push(force(i as f32 / 50.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.drain().len(), 200);
        assert!(queue.is_empty());
    }
}
