/// The current state of a session's request/response cycle.
/// This roughly matches net/base/load_states.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoadState {
    /// The session is idle.
    #[default]
    Idle,

    /// Establishing proxy tunnel (CONNECT).
    EstablishingProxyTunnel,

    /// Connecting to the host (DNS + TCP handshake).
    Connecting,

    /// Establishing an SSL connection.
    SslHandshake,

    /// Sending the HTTP request.
    SendingRequest,

    /// Waiting for the server response headers.
    WaitingForResponse,

    /// Reading the response body.
    ReadingResponse,
}

impl LoadState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LoadState::EstablishingProxyTunnel,
            2 => LoadState::Connecting,
            3 => LoadState::SslHandshake,
            4 => LoadState::SendingRequest,
            5 => LoadState::WaitingForResponse,
            6 => LoadState::ReadingResponse,
            _ => LoadState::Idle,
        }
    }
}

/// Shared view of a session's load state.
///
/// Clones observe the same value, so another task can watch a request
/// that is in flight.
#[derive(Debug, Clone, Default)]
pub struct LoadStateTracker {
    state: std::sync::Arc<std::sync::atomic::AtomicU8>,
}

impl LoadStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> LoadState {
        LoadState::from_u8(self.state.load(std::sync::atomic::Ordering::Relaxed))
    }

    pub fn set(&self, state: LoadState) {
        self.state
            .store(state as u8, std::sync::atomic::Ordering::Relaxed);
    }
}
