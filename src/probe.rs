//! Network reachability probe
//!
//! Each iteration checks that the video host answers before launching. Any
//! HTTP response counts as reachable; only transport failures and timeouts
//! do not.

use crate::config::{probe_url, PROBE_TIMEOUT};
use crate::error::RepeaterError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> Result<(), RepeaterError>;
}

/// `HEAD` request against the video host with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RepeaterError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RepeaterError::NetworkUnavailable {
                url: url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { client, url })
    }

    /// Probe the configured host (`REPEAT_VIEWER_PROBE_URL`) with the default timeout.
    pub fn from_env() -> Result<Self, RepeaterError> {
        Self::new(probe_url(), PROBE_TIMEOUT)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> Result<(), RepeaterError> {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::trace!(url = %self.url, status = %response.status(), "probe ok");
                Ok(())
            }
            Err(err) => Err(RepeaterError::NetworkUnavailable {
                url: self.url.clone(),
                message: err.to_string(),
            }),
        }
    }
}

/// Probe that always succeeds, for offline use and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

#[async_trait]
impl ReachabilityProbe for AlwaysReachable {
    async fn check(&self) -> Result<(), RepeaterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unroutable_host_is_unavailable() {
        // port 9 on localhost: connection refused without touching the network
        let probe = HttpProbe::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = probe.check().await.unwrap_err();
        assert!(matches!(err, RepeaterError::NetworkUnavailable { .. }));
        assert_eq!(err.category(), crate::error::ErrorCategory::Network);
    }

    #[tokio::test]
    async fn test_local_listener_is_reachable() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        let probe = HttpProbe::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        probe.check().await.expect("local server should be reachable");
    }
}
