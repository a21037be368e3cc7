//! Error types for the realtime session.
//!
//! Deliberately narrow: transient send failures on a live session are
//! swallowed (the receive side is authoritative for session health), so only
//! connect-time failures, fatal receive failures and call-site misuse ever
//! surface as errors.

/// Errors surfaced by the realtime session.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Handshake or connection establishment failed; no session was created.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A connect header could not be encoded.
    #[error("invalid header value for {0}")]
    InvalidHeader(String),

    /// Unrecoverable transport read failure; terminates the event stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session is disposed, or its event stream was already consumed.
    #[error("session closed or event stream already consumed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = RealtimeError::Connect("dns failure".into());
        assert!(e.to_string().contains("dns failure"));

        let e = RealtimeError::Transport("reset without closing handshake".into());
        assert!(e.to_string().contains("reset"));
    }
}
