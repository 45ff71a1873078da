//! Typed-text rotation.
//!
//! The animator is a table-driven state machine: every tick maps the current
//! [`TypingState`] to the next state, the delay until the following tick and
//! the text to render. A single timer chain drives it, so there is never more
//! than one tick in flight.

use std::{cell::RefCell, rc::Rc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::TypingConfig,
    dom::{ElementId, SharedDom},
    timeline::Timeline,
};

/// Non-empty, immutable list of strings the animator cycles through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSequence {
    roles: Vec<String>,
}

impl RotationSequence {
    /// Returns `None` for an empty list; an animator without roles never
    /// starts.
    pub fn new<I, S>(roles: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        if roles.is_empty() {
            None
        } else {
            Some(Self { roles })
        }
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn role(&self, index: usize) -> &str {
        &self.roles[index % self.roles.len()]
    }

    /// Length of a role in characters, not bytes.
    pub fn role_len(&self, index: usize) -> usize {
        self.role(index).chars().count()
    }

    fn prefix(&self, index: usize, chars: usize) -> String {
        self.role(index).chars().take(chars).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypingPhase {
    Typing,
    PausedAtFull,
    Deleting,
    PausedAtEmpty,
}

/// Cursor into the rotation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub sequence_index: usize,
    pub char_index: usize,
    pub phase: TypingPhase,
}

impl TypingState {
    pub fn start() -> Self {
        Self {
            sequence_index: 0,
            char_index: 0,
            phase: TypingPhase::Typing,
        }
    }

    pub fn deleting(&self) -> bool {
        matches!(self.phase, TypingPhase::PausedAtFull | TypingPhase::Deleting)
    }
}

/// Delay after each kind of tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingCadence {
    pub type_tick: Duration,
    pub delete_tick: Duration,
    pub full_pause: Duration,
    pub empty_pause: Duration,
    pub start_delay: Duration,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self::from(&TypingConfig::default())
    }
}

impl From<&TypingConfig> for TypingCadence {
    fn from(config: &TypingConfig) -> Self {
        Self {
            type_tick: Duration::from_millis(config.type_tick_ms),
            delete_tick: Duration::from_millis(config.delete_tick_ms),
            full_pause: Duration::from_millis(config.full_pause_ms),
            empty_pause: Duration::from_millis(config.empty_pause_ms),
            start_delay: Duration::from_millis(config.start_delay_ms),
        }
    }
}

/// Result of one tick: where the machine goes, when it ticks next and what
/// the display shows meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: TypingState,
    pub delay: Duration,
    pub text: String,
}

/// Pure transition table.
///
/// A pause phase ends by performing the action of the phase it leads to, so
/// the first deletion happens exactly one full pause after the last
/// character was typed, and the first character of the next role one empty
/// pause after the last deletion.
pub fn transition(
    sequence: &RotationSequence,
    cadence: &TypingCadence,
    state: TypingState,
) -> Transition {
    match state.phase {
        TypingPhase::Typing => type_one(sequence, cadence, state),
        TypingPhase::PausedAtEmpty => {
            let advanced = TypingState {
                sequence_index: (state.sequence_index + 1) % sequence.len(),
                char_index: 0,
                phase: TypingPhase::Typing,
            };
            type_one(sequence, cadence, advanced)
        }
        TypingPhase::PausedAtFull | TypingPhase::Deleting => delete_one(sequence, cadence, state),
    }
}

fn type_one(sequence: &RotationSequence, cadence: &TypingCadence, state: TypingState) -> Transition {
    let len = sequence.role_len(state.sequence_index);
    let char_index = (state.char_index + 1).min(len);
    let (phase, delay) = if char_index == len {
        (TypingPhase::PausedAtFull, cadence.full_pause)
    } else {
        (TypingPhase::Typing, cadence.type_tick)
    };

    Transition {
        next: TypingState {
            sequence_index: state.sequence_index,
            char_index,
            phase,
        },
        delay,
        text: sequence.prefix(state.sequence_index, char_index),
    }
}

fn delete_one(
    sequence: &RotationSequence,
    cadence: &TypingCadence,
    state: TypingState,
) -> Transition {
    let char_index = state.char_index.saturating_sub(1);
    let (phase, delay) = if char_index == 0 {
        (TypingPhase::PausedAtEmpty, cadence.empty_pause)
    } else {
        (TypingPhase::Deleting, cadence.delete_tick)
    };

    Transition {
        next: TypingState {
            sequence_index: state.sequence_index,
            char_index,
            phase,
        },
        delay,
        text: sequence.prefix(state.sequence_index, char_index),
    }
}

/// Self-scheduling animator writing into a single display element.
#[derive(Debug)]
pub struct TypingAnimator {
    dom: SharedDom,
    target: ElementId,
    sequence: RotationSequence,
    cadence: TypingCadence,
    state: TypingState,
    ticks: u64,
}

impl TypingAnimator {
    pub fn new(
        dom: SharedDom,
        target: ElementId,
        sequence: RotationSequence,
        cadence: TypingCadence,
    ) -> Self {
        Self {
            dom,
            target,
            sequence,
            cadence,
            state: TypingState::start(),
            ticks: 0,
        }
    }

    /// Builds an animator from configuration. Returns `None` when the role
    /// list is empty.
    pub fn from_config(dom: SharedDom, target: ElementId, config: &TypingConfig) -> Option<Self> {
        let sequence = RotationSequence::new(config.roles.iter().cloned())?;
        Some(Self::new(dom, target, sequence, TypingCadence::from(config)))
    }

    pub fn state(&self) -> TypingState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sequence(&self) -> &RotationSequence {
        &self.sequence
    }

    /// Schedules the first tick after the start delay. The animator only
    /// starts when its display element exists.
    pub fn spawn(self, timeline: &mut Timeline) -> Option<Rc<RefCell<Self>>> {
        if !self.dom.borrow().contains(&self.target) {
            tracing::debug!(element = %self.target, "typing target absent; animator not started");
            return None;
        }

        let delay = self.cadence.start_delay;
        let shared = Rc::new(RefCell::new(self));
        schedule_tick(&shared, timeline, delay);
        Some(shared)
    }

    /// Applies one transition and returns the delay before the next tick.
    pub fn tick(&mut self) -> Duration {
        let step = transition(&self.sequence, &self.cadence, self.state);
        self.dom.borrow_mut().set_text(&self.target, &step.text);
        tracing::trace!(
            role = self.state.sequence_index,
            chars = step.next.char_index,
            phase = ?step.next.phase,
            "typing tick"
        );
        self.state = step.next;
        self.ticks += 1;
        step.delay
    }
}

fn schedule_tick(animator: &Rc<RefCell<TypingAnimator>>, timeline: &mut Timeline, delay: Duration) {
    let animator = Rc::clone(animator);
    timeline.schedule(delay, move |timeline| {
        let next_delay = animator.borrow_mut().tick();
        schedule_tick(&animator, timeline, next_delay);
    });
}
