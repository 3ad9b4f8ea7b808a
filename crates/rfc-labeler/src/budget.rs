//! Per-sweep cap on mark actions.

use crate::config::MAX_ACTIONS_PER_RUN;

/// Remaining mark actions for one sweep.
///
/// Owned by a single sweep invocation; never shared between repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBudget {
    remaining: u32,
}

impl RunBudget {
    /// Budget of `min(limit_per_run, 30)` actions.
    #[must_use]
    pub fn new(limit_per_run: u32) -> Self {
        Self {
            remaining: limit_per_run.min(MAX_ACTIONS_PER_RUN),
        }
    }

    /// Take one unit. Returns false once the budget is spent.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
