//! PubNub publisher for device log channels

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use switchover_migration::{LogLine, NotificationPublisher, PublishError};
use tracing::debug;

const PUBNUB_ORIGIN: &str = "https://ps.pndsn.com";

/// Publishes through PubNub's REST publish endpoint
pub struct PubNubPublisher {
    client: Client,
    origin: String,
    publish_key: String,
    subscribe_key: String,
}

impl PubNubPublisher {
    pub fn new(
        publish_key: &str,
        subscribe_key: &str,
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            origin: PUBNUB_ORIGIN.to_string(),
            publish_key: publish_key.to_string(),
            subscribe_key: subscribe_key.to_string(),
        })
    }

    /// `GET /publish/<pub>/<sub>/0/<channel>/0/<message>`
    fn publish_url(&self, channel: &str, lines: &[LogLine]) -> Result<Url, PublishError> {
        let message =
            serde_json::to_string(lines).map_err(|e| PublishError::Transport(e.to_string()))?;
        let mut url =
            Url::parse(&self.origin).map_err(|e| PublishError::Transport(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| PublishError::Transport(format!("invalid origin {}", self.origin)))?
            .extend([
                "publish",
                self.publish_key.as_str(),
                self.subscribe_key.as_str(),
                "0",
                channel,
                "0",
                message.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl NotificationPublisher for PubNubPublisher {
    async fn publish(&self, channel: &str, lines: &[LogLine]) -> Result<u16, PublishError> {
        let url = self.publish_url(channel, lines)?;
        debug!(channel = channel, "Publishing to PubNub");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_url_layout() {
        let publisher = PubNubPublisher::new("pub-c-1", "sub-c-2", Duration::from_secs(5)).unwrap();
        let lines = [LogLine {
            t: 1,
            m: "bye now".into(),
        }];

        let url = publisher.publish_url("device-d1-logs", &lines).unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();

        assert_eq!(url.host_str(), Some("ps.pndsn.com"));
        assert_eq!(
            &segments[..6],
            &["publish", "pub-c-1", "sub-c-2", "0", "device-d1-logs", "0"]
        );
        // The message is percent-encoded into the last segment
        assert!(segments[6].contains("%22m%22"));
        assert!(!segments[6].contains(' '));
        assert!(!segments[6].contains('"'));
    }
}
