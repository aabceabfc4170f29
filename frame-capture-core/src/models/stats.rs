use serde::{Deserialize, Serialize};

use super::timestamp::Timestamp;

/// Diagnostics for a capture controller.
///
/// `started_at` is wall-clock time of `setup` for humans reading logs; frame
/// times are monotonic `Timestamp`s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub session_id: String,
    pub started_at: Option<String>,
    pub frames_published: u64,
    pub reads_served: u64,
    pub idle_cycles: u64,
    pub busy_retries: u64,
    pub first_frame_at: Option<Timestamp>,
    pub last_frame_at: Option<Timestamp>,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(chrono::Utc::now().to_rfc3339());
    }

    pub fn record_publish(&mut self, timestamp: Timestamp) {
        self.frames_published += 1;
        if self.first_frame_at.is_none() {
            self.first_frame_at = Some(timestamp);
        }
        self.last_frame_at = Some(timestamp);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
