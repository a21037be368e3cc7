//! Realtime duplex session client for the murmur conversation protocol.
//!
//! Owns one live WebSocket connection per session and exposes the whole
//! exchange as a cancellable asynchronous stream:
//!
//! ```text
//! caller events ──→ encode ──→ write lock ──→ transport ──┐
//!                                                         │ duplex socket
//! event stream ←── queue ←── classify ←── reassemble ←────┘
//!                              (background receive loop)
//! ```
//!
//! Send failures on a live session are best-effort by design; the receive
//! side closing (cleanly or with an error) is the authoritative signal that
//! the session is over. Reconnection is the caller's job: create a new
//! session.
//!
//! ## Crate Position
//!
//! Depends on: murmur-core (wire model).

pub mod error;
pub mod frame;
pub mod session;

pub use error::RealtimeError;
pub use frame::{Assembled, FrameAssembler};
pub use session::{ConnectOptions, RealtimeSession, DEFAULT_ENDPOINT};
