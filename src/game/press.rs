//! Press-and-Hold Progress
//!
//! Timer driven by press/release edges and per-frame deltas.
//! Drives both sabotage repair and life regeneration.

use std::fmt;

use crate::core::clock::Millis;

/// Released progress decays this many times faster than it accumulates.
pub const RELEASE_DECAY_FACTOR: Millis = 3;

/// Incremental feedback for callers that animate the press (pulsing, arcs).
///
/// Carries no state of its own and is independent of completion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressNotification {
    /// Press began
    PressStart,
    /// Held for another frame of `delta` ms
    Pressing(Millis),
    /// Press released
    PressEnd,
    /// Normalized progress after a tick
    ProgressUpdated(f64),
}

/// Completion handler. Receives the timer so it can `reset()` it.
pub type PressedHandler = Box<dyn FnMut(&mut PressProgress) + Send>;

/// Press-and-hold state machine.
///
/// While pressed, `elapsed_ms` grows by the frame delta until it first
/// exceeds `required_ms`, at which point completion fires once. While
/// released it shrinks by three times the delta, floored at zero.
/// Completion re-arms only through `reset()`.
pub struct PressProgress {
    required_ms: Option<Millis>,
    elapsed_ms: Millis,
    completed: bool,
    is_pressed: bool,
    pressed_handler: Option<PressedHandler>,
    notifications: Vec<PressNotification>,
}

impl fmt::Debug for PressProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PressProgress")
            .field("required_ms", &self.required_ms)
            .field("elapsed_ms", &self.elapsed_ms)
            .field("completed", &self.completed)
            .field("is_pressed", &self.is_pressed)
            .field("has_handler", &self.pressed_handler.is_some())
            .finish()
    }
}

impl PressProgress {
    /// Create a timer. `None` tracks press state only and never completes.
    pub fn new(required_ms: Option<Millis>) -> Self {
        Self {
            required_ms,
            elapsed_ms: 0,
            completed: false,
            is_pressed: false,
            pressed_handler: None,
            notifications: Vec::new(),
        }
    }

    /// Install the completion handler.
    pub fn set_pressed_handler(&mut self, handler: PressedHandler) {
        self.pressed_handler = Some(handler);
    }

    /// Input layer: press began.
    pub fn on_press_start(&mut self) {
        if !self.is_pressed {
            self.is_pressed = true;
            self.notifications.push(PressNotification::PressStart);
        }
    }

    /// Input layer: press released.
    pub fn on_press_end(&mut self) {
        if self.is_pressed {
            self.is_pressed = false;
            self.notifications.push(PressNotification::PressEnd);
        }
    }

    /// Advance by one frame. Returns `true` on the tick that completes.
    pub fn tick(&mut self, delta_ms: Millis) -> bool {
        if delta_ms == 0 {
            return false;
        }

        let completed = if self.is_pressed {
            self.notifications.push(PressNotification::Pressing(delta_ms));
            self.accumulate(delta_ms)
        } else {
            self.decay(delta_ms);
            false
        };

        if let Some(progress) = self.progress() {
            self.notifications.push(PressNotification::ProgressUpdated(progress));
        }

        if completed {
            if let Some(mut handler) = self.pressed_handler.take() {
                handler(self);
                if self.pressed_handler.is_none() {
                    self.pressed_handler = Some(handler);
                }
            }
        }

        completed
    }

    fn accumulate(&mut self, delta_ms: Millis) -> bool {
        let Some(required) = self.required_ms else {
            return false;
        };
        if self.completed {
            return false;
        }
        self.elapsed_ms += delta_ms;
        self.completed = self.elapsed_ms > required;
        self.completed
    }

    fn decay(&mut self, delta_ms: Millis) {
        if self.required_ms.is_none() {
            return;
        }
        self.elapsed_ms = self
            .elapsed_ms
            .saturating_sub(delta_ms.saturating_mul(RELEASE_DECAY_FACTOR));
    }

    /// `elapsed / required`, or `None` when unconfigured.
    pub fn progress(&self) -> Option<f64> {
        self.required_ms
            .map(|required| self.elapsed_ms as f64 / required as f64)
    }

    /// Zero the accumulated time and re-arm completion.
    pub fn reset(&mut self) {
        self.elapsed_ms = 0;
        self.completed = false;
    }

    /// Accumulated hold time.
    #[inline]
    pub fn elapsed_ms(&self) -> Millis {
        self.elapsed_ms
    }

    /// Hold time needed to complete.
    #[inline]
    pub fn required_ms(&self) -> Option<Millis> {
        self.required_ms
    }

    /// Whether the input is currently held.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.is_pressed
    }

    /// Whether completion has fired since the last reset.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Drain buffered notifications.
    pub fn take_notifications(&mut self) -> Vec<PressNotification> {
        std::mem::take(&mut self.notifications)
    }
}
