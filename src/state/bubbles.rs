//! Category-bubble expansion
//!
//! Each top-level bubble opens a modal listing nested categories. Opening
//! is retried a bounded number of times; closing the modal is retried with
//! off-center clicks, and if it still will not close the whole discovery
//! is abandoned so the caller can reload the page and start over.

use std::time::Duration;

/// Bounds for the local retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionPolicy {
    /// Pause once the bubbles are clickable, before the first click
    pub render_delay: Duration,
    /// Clicks on a bubble before moving on without its links
    pub open_attempts: u32,
    pub open_interval: Duration,
    /// Off-center clicks before giving up on the page
    pub dismiss_attempts: u32,
    pub dismiss_interval: Duration,
    /// Pause after the modal closed, before the next bubble
    pub settle_delay: Duration,
    /// Pause before the caller reloads the whole page
    pub escalation_delay: Duration,
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        Self {
            render_delay: Duration::from_secs(10),
            open_attempts: 20,
            open_interval: Duration::from_secs(2),
            dismiss_attempts: 10,
            dismiss_interval: Duration::from_secs(3),
            settle_delay: Duration::from_secs(2),
            escalation_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    /// Clicking bubble `bubble` until its modal shows links
    Opening { bubble: usize, attempt: u32 },
    /// Clicking outside the modal of bubble `bubble` until it closes
    Dismissing { bubble: usize, attempt: u32 },
    /// Every bubble was visited
    Done,
    /// The modal would not close; reload the page and retry from the top
    Escalated,
}

/// Drives the expansion of `bubbles` top-level bubbles
#[derive(Debug, Clone)]
pub struct BubbleExpansion {
    policy: ExpansionPolicy,
    bubbles: usize,
    state: ExpansionState,
}

impl BubbleExpansion {
    pub fn new(policy: ExpansionPolicy, bubbles: usize) -> Self {
        let state = if bubbles == 0 {
            ExpansionState::Done
        } else {
            ExpansionState::Opening {
                bubble: 0,
                attempt: 0,
            }
        };
        Self {
            policy,
            bubbles,
            state,
        }
    }

    pub fn state(&self) -> ExpansionState {
        self.state
    }

    pub fn policy(&self) -> &ExpansionPolicy {
        &self.policy
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ExpansionState::Done | ExpansionState::Escalated)
    }

    /// Outcome of one click on the current bubble
    pub fn record_open(&mut self, links_found: bool) -> ExpansionState {
        if let ExpansionState::Opening { bubble, attempt } = self.state {
            let attempt = attempt + 1;
            self.state = if links_found || attempt >= self.policy.open_attempts {
                if !links_found {
                    tracing::warn!(bubble, attempt, "Bubble modal never showed links");
                }
                self.after_bubble(bubble)
            } else {
                ExpansionState::Opening { bubble, attempt }
            };
        }
        self.state
    }

    /// Outcome of one off-center click meant to close the modal
    pub fn record_dismiss(&mut self, closed: bool) -> ExpansionState {
        if let ExpansionState::Dismissing { bubble, attempt } = self.state {
            self.state = if closed {
                ExpansionState::Opening {
                    bubble: bubble + 1,
                    attempt: 0,
                }
            } else if attempt + 1 > self.policy.dismiss_attempts {
                tracing::warn!(bubble, "Bubble modal would not close, escalating");
                ExpansionState::Escalated
            } else {
                ExpansionState::Dismissing {
                    bubble,
                    attempt: attempt + 1,
                }
            };
        }
        self.state
    }

    /// Pause before acting in the current state
    pub fn delay(&self) -> Duration {
        match self.state {
            ExpansionState::Opening { .. } => self.policy.open_interval,
            ExpansionState::Dismissing { .. } => self.policy.dismiss_interval,
            ExpansionState::Done => Duration::ZERO,
            ExpansionState::Escalated => self.policy.escalation_delay,
        }
    }

    // The last modal stays open; the browser is closed right after
    fn after_bubble(&self, bubble: usize) -> ExpansionState {
        if bubble + 1 >= self.bubbles {
            ExpansionState::Done
        } else {
            ExpansionState::Dismissing { bubble, attempt: 0 }
        }
    }
}

/// Click offset from the overlay center for the given dismiss attempt
///
/// The first click lands well below and right of the modal; later ones walk
/// left from the center.
pub fn dismiss_offset(attempt: u32) -> (f64, f64) {
    if attempt == 0 {
        (200.0, 200.0)
    } else {
        (-40.0 * f64::from(attempt), 0.0)
    }
}
