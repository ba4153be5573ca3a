use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Close code used when the transport went away without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code sent by [`WebSocketManager::close`](super::WebSocketManager::close) by default.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code the backend uses when it rejects the `token` query parameter.
pub const CLOSE_AUTH_REJECTED: u16 = 4001;

/// Connection state, mirroring the transport's ready state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, or the transport has finished closing
    #[default]
    Closed,
    /// Handshake in progress
    Connecting,
    /// Handshake complete, messages can be sent
    Open,
    /// Close frame sent, waiting for the transport to finish
    Closing,
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Details of a transport close, passed to the `on_close` callback.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// Whether a close frame was exchanged before the transport ended
    pub was_clean: bool,
}

impl CloseInfo {
    /// The transport ended without a close frame.
    #[must_use]
    pub fn abnormal() -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
            was_clean: false,
        }
    }

    /// Whether the server closed the socket because it rejected the token.
    #[must_use]
    pub fn is_auth_rejected(&self) -> bool {
        self.code == CLOSE_AUTH_REJECTED
    }
}

impl From<Option<CloseFrame>> for CloseInfo {
    fn from(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(frame) => Self {
                code: frame.code.into(),
                reason: frame.reason.as_str().to_owned(),
                was_clean: true,
            },
            // A close frame with no payload is still a clean close
            None => Self {
                code: 1005,
                reason: String::new(),
                was_clean: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use super::*;

    #[test]
    fn only_open_is_connected() {
        assert!(ConnectionState::Open.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Closing.is_connected());
        assert!(!ConnectionState::Closed.is_connected());
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }

    #[test]
    fn close_frame_converts_code_and_reason() {
        let info = CloseInfo::from(Some(CloseFrame {
            code: CloseCode::Library(CLOSE_AUTH_REJECTED),
            reason: "token expired".into(),
        }));

        assert_eq!(info.code, 4001);
        assert_eq!(info.reason, "token expired");
        assert!(info.was_clean);
        assert!(info.is_auth_rejected());
    }

    #[test]
    fn missing_frame_is_abnormal() {
        let info = CloseInfo::abnormal();

        assert_eq!(info.code, 1006);
        assert!(!info.was_clean);
        assert!(!info.is_auth_rejected());
    }
}
