//! Timed input for scripted and deterministic runs.
//!
//! Events carry a frame number; the orchestrator applies everything due
//! at the start of each frame. Useful for tests and headless playback.

use std::collections::VecDeque;

use crate::controller::{Button, Controller};

/// A frame-stamped button edge.
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub frame: u64,
    pub port: usize,
    pub button: Button,
    pub pressed: bool,
}

/// Queue of timed button events, kept sorted by frame.
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Enqueue a raw event.
    pub fn push(&mut self, event: InputEvent) {
        let pos = self
            .events
            .iter()
            .position(|e| e.frame > event.frame)
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Enqueue a press at `at_frame` and its release `hold_frames` later.
    pub fn press(&mut self, port: usize, button: Button, at_frame: u64, hold_frames: u64) {
        self.push(InputEvent {
            frame: at_frame,
            port,
            button,
            pressed: true,
        });
        self.push(InputEvent {
            frame: at_frame + hold_frames,
            port,
            button,
            pressed: false,
        });
    }

    /// Apply all events due at `frame`.
    pub fn process(&mut self, frame: u64, controllers: &mut [Controller; 2]) {
        while let Some(event) = self.events.front() {
            if event.frame > frame {
                break;
            }
            let event = self.events.pop_front().expect("front was Some");
            controllers[event.port.min(1)].set_button(event.button, event.pressed);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
