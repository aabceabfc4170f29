use crate::models::error::CaptureError;
use crate::models::state::ControllerState;
use crate::models::timestamp::Timestamp;

/// Event delegate for capture controller notifications.
///
/// `on_state_changed` runs on the thread that caused the transition.
/// `on_first_frame` and `on_stream_ended` run on the producer thread and must
/// not block; the producer does not capture while they run.
pub trait CaptureObserver: Send + Sync {
    /// Called when the controller state changes.
    fn on_state_changed(&self, state: ControllerState);

    /// Called once, after the first frame is published.
    fn on_first_frame(&self, timestamp: Timestamp);

    /// Called when the producer ends the stream on its own: source
    /// exhaustion, source failure, or a pool invariant violation.
    fn on_stream_ended(&self, reason: &CaptureError);
}
