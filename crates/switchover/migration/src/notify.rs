//! Tombstone notifications
//!
//! After a device moves to the new release, one advisory line is published
//! on its log channel telling log consumers that old clients will stop
//! receiving logs. Delivery is fire-and-forget; only the transport status is
//! checked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default tombstone text
pub const DEFAULT_TOMBSTONE_MESSAGE: &str = "Logging functionality will be disabled for old clients, please update to at least SDK v9.0.4 or CLI v7.8.3";

/// Transport status that counts as delivered
pub const PUBLISH_OK: u16 = 200;

/// One log line as log consumers expect it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Unix timestamp in milliseconds
    pub t: i64,
    /// Message text
    pub m: String,
}

impl LogLine {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            t: chrono::Utc::now().timestamp_millis(),
            m: message.into(),
        }
    }
}

/// Publish errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Notifications are not configured")]
    Disabled,

    #[error("Publish failed: {0}")]
    Transport(String),
}

/// Fire-and-forget publisher for device log channels
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish `lines` on `channel`, returning the transport status
    async fn publish(&self, channel: &str, lines: &[LogLine]) -> Result<u16, PublishError>;
}

/// Publisher used when no notification transport is configured
pub struct DisabledPublisher;

#[async_trait]
impl NotificationPublisher for DisabledPublisher {
    async fn publish(&self, _channel: &str, _lines: &[LogLine]) -> Result<u16, PublishError> {
        Err(PublishError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_shape() {
        let line = LogLine {
            t: 1_700_000_000_000,
            m: "hello".into(),
        };
        let json = serde_json::to_value(vec![line]).unwrap();
        assert_eq!(json, serde_json::json!([{ "t": 1_700_000_000_000i64, "m": "hello" }]));
    }

    #[test]
    fn test_log_line_now_is_millis() {
        let line = LogLine::now(DEFAULT_TOMBSTONE_MESSAGE);
        assert!(line.t > 1_000_000_000_000);
    }

    #[tokio::test]
    async fn test_disabled_publisher() {
        let result = DisabledPublisher.publish("device-d1-logs", &[]).await;
        assert!(matches!(result, Err(PublishError::Disabled)));
    }
}
