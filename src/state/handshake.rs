//! Location handshake states
//!
//! The handshake drives a browser through the address form until the site
//! sets its session cookie. Any state may move to `Closed`, which is how
//! both the success and the failure paths release the browser.

use crate::{BrowserError, BrowserResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// No browser yet
    Idle,

    /// Browser launched and the landing page requested
    DriverReady,

    /// Address typed into the location form
    AddressEntered,

    /// First autocomplete suggestion picked and street number submitted
    SuggestionSelected,

    /// The store listing rendered after the form was submitted
    ResultsVisible,

    /// Session cookie read back from the browser
    CookieCaptured,

    /// Browser shut down
    Closed,
}

impl HandshakeState {
    /// The state that normally follows this one
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::DriverReady),
            Self::DriverReady => Some(Self::AddressEntered),
            Self::AddressEntered => Some(Self::SuggestionSelected),
            Self::SuggestionSelected => Some(Self::ResultsVisible),
            Self::ResultsVisible => Some(Self::CookieCaptured),
            Self::CookieCaptured => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        match next {
            Self::Closed => *self != Self::Closed,
            _ => self.successor() == Some(next),
        }
    }

    /// Validated transition
    pub fn transition(self, next: Self) -> BrowserResult<Self> {
        if self.can_transition_to(next) {
            tracing::trace!("Handshake {} -> {}", self, next);
            Ok(next)
        } else {
            Err(BrowserError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Moves to the successor state
    pub fn advance(self) -> BrowserResult<Self> {
        match self.successor() {
            Some(next) => self.transition(next),
            None => Err(BrowserError::InvalidTransition {
                from: self,
                to: self,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DriverReady => "driver_ready",
            Self::AddressEntered => "address_entered",
            Self::SuggestionSelected => "suggestion_selected",
            Self::ResultsVisible => "results_visible",
            Self::CookieCaptured => "cookie_captured",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
