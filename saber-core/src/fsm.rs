//! Generic state machine engine
//!
//! The engine only keeps bookkeeping: current and last state, the
//! new-state flag and the time of the last transition. Mode behavior lives
//! in a [`StateBody`] implementation, which decides every transition itself
//! by calling [`StateMachine::change_state`]. There is no transition table.

use crate::hal::{Duration, Instant};

/// Behavior plugged into a [`StateMachine`]
pub trait StateBody<S> {
    /// One-time setup before the first cycle
    fn init(&mut self, fsm: &mut StateMachine<S>);

    /// Per-cycle behavior, dispatched on `fsm.state()`
    fn body(&mut self, fsm: &mut StateMachine<S>);
}

/// State bookkeeping shared by every concrete machine
#[derive(Debug)]
pub struct StateMachine<S> {
    state: S,
    last_state: Option<S>,
    is_new_state: bool,
    state_entered_at: Instant,
}

impl<S> StateMachine<S>
where
    S: Copy + PartialEq,
{
    /// Create an engine sitting in `initial`. The first `operate` call
    /// always sees a new state.
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            last_state: None,
            is_new_state: false,
            state_entered_at: Instant::from_millis(0),
        }
    }

    pub fn init<B: StateBody<S>>(&mut self, body: &mut B) {
        body.init(self);
    }

    /// Run one cycle: update bookkeeping, then call the body
    pub fn operate<B: StateBody<S>>(&mut self, body: &mut B) {
        self.is_new_state = self.last_state != Some(self.state);
        self.last_state = Some(self.state);
        body.body(self);
    }

    /// Request a transition. Takes effect on the next `operate` call.
    pub fn change_state(&mut self, state: S, now: Instant) {
        self.state = state;
        self.state_entered_at = now;
    }

    pub fn state(&self) -> S {
        self.state
    }

    /// State seen at the start of the most recent cycle
    pub fn last_state(&self) -> Option<S> {
        self.last_state
    }

    /// True only during the first cycle after a state change
    pub fn is_new_state(&self) -> bool {
        self.is_new_state
    }

    pub fn state_entered_at(&self) -> Instant {
        self.state_entered_at
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state_entered_at)
    }
}
