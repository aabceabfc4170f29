/// Capture controller state machine.
///
/// State transitions:
/// ```text
/// created → ready (not active) ⇄ active
///                 ↓               ↓
///              quitting ──────→ stopped
/// ```
///
/// `Quitting` is entered either by `finish_capture` or by the source
/// reporting end of stream. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Created,
    ReadyNotActive,
    Active,
    Quitting,
    Stopped,
}

impl ControllerState {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The quit flag has been raised, whether or not the thread was joined.
    pub fn is_quitting(&self) -> bool {
        matches!(self, Self::Quitting | Self::Stopped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
