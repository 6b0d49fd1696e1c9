//! Application state for the API server.

use safeguard_sync::EngineHandle;

/// Shared application state.
///
/// Every transport (the classify endpoint and both sockets) holds the
/// same engine handle; the engine task owns all mutable state.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the policy engine task.
    pub engine: EngineHandle,
}

impl AppState {
    /// Creates application state around an engine handle.
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}
