//! Board Clock
//!
//! The continuously advancing simulation timestamp shared by every rail.
//! Owned by the frame loop; rails only read the `ClockTick` it produces.

use super::queue::OrderedQueue;

/// Simulation time and durations, in milliseconds.
pub type Millis = u64;

/// Width of the frame-rate sliding window.
pub const FPS_WINDOW_MS: Millis = 1000;

/// One advance of the simulation clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockTick {
    /// Simulation time after this advance.
    pub now: Millis,
    /// Bounded frame delta that produced `now`.
    pub delta: Millis,
}

/// Monotonic simulation clock with bounded frame delta.
#[derive(Clone, Debug)]
pub struct BoardClock {
    now: Millis,
    max_delta: Millis,
    /// (timestamp, instantaneous fps) samples within the last second.
    frames: OrderedQueue<(Millis, f64)>,
}

impl BoardClock {
    /// Create a clock at time zero.
    ///
    /// Frame deltas larger than `max_delta` (tab switch, debugger pause)
    /// are clamped so one slow frame cannot skip whole timing windows.
    pub fn new(max_delta: Millis) -> Self {
        Self {
            now: 0,
            max_delta,
            frames: OrderedQueue::new(),
        }
    }

    /// Current simulation time.
    #[inline]
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Advance by a frame delta.
    pub fn advance(&mut self, delta: Millis) -> ClockTick {
        let delta = delta.min(self.max_delta);
        self.now = self.now.saturating_add(delta);
        self.record_frame(delta);
        ClockTick {
            now: self.now,
            delta,
        }
    }

    fn record_frame(&mut self, delta: Millis) {
        if delta > 0 {
            self.frames.push_back((self.now, 1000.0 / delta as f64));
        }
        while let Some(&(time, _)) = self.frames.peek_front() {
            if self.now - time > FPS_WINDOW_MS {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average frame rate over the last second, or `None` before the first frame.
    pub fn average_fps(&self) -> Option<f64> {
        if self.frames.is_empty() {
            return None;
        }
        let sum: f64 = self.frames.iter().map(|(_, fps)| fps).sum();
        Some(sum / self.frames.len() as f64)
    }
}
