//! Per-invocation lifecycle states.
//!
//! Each invocation moves forward through
//! `Created -> Resolving -> Spawned -> (Running | TimedOut) -> (Succeeded | Failed)`
//! and never back. Early failures (unknown script, bad arguments, spawn
//! error) jump straight to `Failed`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Created,
    Resolving,
    Spawned,
    Running,
    TimedOut,
    Succeeded,
    Failed,
}

impl InvocationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Resolving => "resolving",
            Self::Spawned => "spawned",
            Self::Running => "running",
            Self::TimedOut => "timed_out",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Created, Resolving)
                | (Resolving, Spawned)
                | (Resolving, Failed)
                | (Spawned, Running)
                | (Spawned, TimedOut)
                | (Spawned, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (TimedOut, Failed)
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one invocation's state and traces each transition.
#[derive(Debug)]
pub struct InvocationTracker<'a> {
    script: &'a str,
    state: InvocationState,
}

impl<'a> InvocationTracker<'a> {
    pub fn new(script: &'a str) -> Self {
        Self {
            script,
            state: InvocationState::Created,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Move to `next`. Illegal transitions are ignored (and flagged in debug builds).
    pub fn advance(&mut self, next: InvocationState) {
        if !self.state.can_transition_to(next) {
            debug_assert!(false, "illegal transition {} -> {next}", self.state);
            tracing::warn!(script = self.script, from = %self.state, to = %next, "Illegal invocation transition");
            return;
        }
        tracing::debug!(script = self.script, from = %self.state, to = %next, "Invocation state change");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
