//! Session connection state

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// What an established link is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkActivity {
    /// Nothing outstanding
    Idle,
    /// A command write is outstanding
    Writing {
        /// A status request is part of this exchange
        awaiting_status: bool,
    },
    /// A status request went out and no status frame has arrived yet
    AwaitingStatus,
}

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected(LinkActivity),
}

impl SessionState {
    /// Check if a connection is established
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    /// Check if a connect attempt is in flight
    pub fn is_connecting(&self) -> bool {
        matches!(self, SessionState::Connecting)
    }

    /// Check if a write is outstanding
    pub fn is_writing(&self) -> bool {
        matches!(self, SessionState::Connected(LinkActivity::Writing { .. }))
    }

    /// Check if a requested status has not arrived yet
    pub fn is_awaiting_status(&self) -> bool {
        matches!(
            self,
            SessionState::Connected(LinkActivity::AwaitingStatus)
                | SessionState::Connected(LinkActivity::Writing {
                    awaiting_status: true
                })
        )
    }

    /// Claim the link for a write
    ///
    /// Returns `false` without changing anything if a write is already
    /// outstanding. The caller must hold a live link.
    pub fn begin_write(&mut self, expect_status: bool) -> bool {
        let awaiting_status = match *self {
            SessionState::Connected(LinkActivity::Writing { .. }) => return false,
            SessionState::Connected(LinkActivity::AwaitingStatus) => true,
            _ => expect_status,
        };
        *self = SessionState::Connected(LinkActivity::Writing { awaiting_status });
        true
    }

    /// Release the link after a write, successful or not
    pub fn finish_write(&mut self) {
        if let SessionState::Connected(LinkActivity::Writing { awaiting_status }) = *self {
            *self = SessionState::Connected(if awaiting_status {
                LinkActivity::AwaitingStatus
            } else {
                LinkActivity::Idle
            });
        }
    }

    /// A status frame arrived
    pub fn status_received(&mut self) {
        match *self {
            SessionState::Connected(LinkActivity::AwaitingStatus) => {
                *self = SessionState::Connected(LinkActivity::Idle);
            }
            SessionState::Connected(LinkActivity::Writing { .. }) => {
                *self = SessionState::Connected(LinkActivity::Writing {
                    awaiting_status: false,
                });
            }
            _ => {}
        }
    }
}
