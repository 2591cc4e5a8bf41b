//! State machines for the interactive browser flows
//!
//! # Components
//!
//! - `HandshakeState`: Bringo's location handshake, from a fresh browser to a
//!   captured session cookie
//! - `BubbleExpansion`: Glovo's category-bubble expansion with bounded local
//!   retries and escalation to a whole-page reload

mod bubbles;
mod handshake;

pub use bubbles::{dismiss_offset, BubbleExpansion, ExpansionPolicy, ExpansionState};
pub use handshake::HandshakeState;
