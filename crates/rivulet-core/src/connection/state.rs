use std::fmt;

/// Lifecycle of a [`StreamingConnection`](super::StreamingConnection).
///
/// `Idle -> Connecting -> Streaming`, then either `Completed`, `Failed`, or
/// `Retrying -> Connecting` again. `Disposed` is reachable from anywhere and
/// never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Streaming,
    /// A handler claimed the last failure; a reconnect is scheduled.
    Retrying,
    Completed,
    Failed,
    Disposed,
}

impl ConnectionState {
    /// No further tokens or retries will happen in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Completed | ConnectionState::Failed | ConnectionState::Disposed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Completed => "completed",
            ConnectionState::Failed => "failed",
            ConnectionState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
