use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Configuration for a capture controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound for a reader waiting on the first frame (None = wait until
    /// a frame is published or the stream ends).
    pub read_timeout_ms: Option<u64>,

    /// Upper bound for `finish_capture` waiting on the producer thread
    /// (None = wait for the in-flight capture to return).
    pub shutdown_timeout_ms: Option<u64>,

    /// Sleep between producer iterations while capture is paused (default: 1).
    pub idle_poll_interval_ms: u64,

    /// Name given to the producer thread (default: "frame-capture").
    pub thread_name: String,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.read_timeout_ms == Some(0) {
            return Err("read timeout must be positive".into());
        }
        if self.shutdown_timeout_ms == Some(0) {
            return Err("shutdown timeout must be positive".into());
        }
        if self.idle_poll_interval_ms == 0 {
            return Err("idle poll interval must be positive".into());
        }
        if self.thread_name.is_empty() {
            return Err("thread name must not be empty".into());
        }
        if self.thread_name.contains('\0') {
            return Err(format!("thread name contains NUL: {:?}", self.thread_name));
        }
        Ok(())
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: ControllerConfig = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to parse config: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: None,
            shutdown_timeout_ms: None,
            idle_poll_interval_ms: 1,
            thread_name: "frame-capture".into(),
        }
    }
}
