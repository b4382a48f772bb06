//! Batched push of metrics to the server's `/updates` endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use metrix_core::error::{MetrixError, Result};
use metrix_core::protocol::{Converter, MetricMessage};
use metrix_core::Metric;

pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// Turn a configured server address into the batch endpoint URL. A missing
/// scheme means `http://`.
pub fn normalize_url(server_url: &str) -> Result<String> {
    let raw = server_url.trim();
    if raw.is_empty() {
        return Err(MetrixError::EmptyUrl);
    }
    let base = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    Ok(format!("{}/updates", base.trim_end_matches('/')))
}

pub struct Pusher {
    client: reqwest::Client,
    url: String,
    converter: Converter,
    batch_size: usize,
    real_ip: Option<String>,
}

impl Pusher {
    pub fn new(server_url: &str, converter: Converter, batch_size: usize) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: normalize_url(server_url)?,
            converter,
            batch_size: batch_size.max(1),
            real_ip: None,
        })
    }

    pub fn with_real_ip(mut self, ip: impl Into<String>) -> Self {
        self.real_ip = Some(ip.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push `metrics` in chunks of `batch_size`.
    ///
    /// Each chunk is converted in full before sending; a conversion error
    /// aborts the push. Once a chunk is acknowledged with 200, each counter
    /// gives up exactly the total that was sent, so increments recorded while
    /// the request was in flight survive for the next push. A failure on a
    /// later chunk keeps the earlier chunks' progress.
    pub async fn push(&self, metrics: &[Metric], timeout: Duration) -> Result<()> {
        for chunk in metrics.chunks(self.batch_size) {
            // one read per metric: the message and the acknowledgement share it
            let sent: Vec<Metric> = chunk.iter().map(Metric::detached).collect();
            let msgs = sent
                .iter()
                .map(|m| self.converter.to_message(m))
                .collect::<Result<Vec<_>>>()?;

            self.send(&msgs, timeout).await?;
            for (m, snapshot) in chunk.iter().zip(&sent) {
                m.acknowledge(snapshot.value());
            }
            debug!(count = chunk.len(), "chunk acknowledged");
        }
        Ok(())
    }

    async fn send(&self, msgs: &[MetricMessage], timeout: Duration) -> Result<()> {
        let mut req = self.client.post(&self.url).json(msgs);
        if let Some(ip) = &self.real_ip {
            req = req.header(REAL_IP_HEADER, ip);
        }
        tokio::time::timeout(timeout, self.exchange(req))
            .await
            .map_err(|_| MetrixError::Transport(format!("push timed out after {timeout:?}")))?
    }

    async fn exchange(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = req
            .send()
            .await
            .map_err(|e| MetrixError::Transport(format!("post {}: {e}", self.url)))?;
        let status = resp.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MetrixError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization() {
        assert_eq!(normalize_url("localhost:8080").unwrap(), "http://localhost:8080/updates");
        assert_eq!(normalize_url("localhost").unwrap(), "http://localhost/updates");
        assert_eq!(normalize_url("10.0.0.1:9000/").unwrap(), "http://10.0.0.1:9000/updates");
        assert_eq!(
            normalize_url("https://metrics.example.com").unwrap(),
            "https://metrics.example.com/updates"
        );
        assert!(matches!(normalize_url("  "), Err(MetrixError::EmptyUrl)));
    }

    #[tokio::test]
    async fn empty_push_sends_nothing() {
        // nothing listens on this port; no request means no error
        let p = Pusher::new("127.0.0.1:1", Converter::default(), 10).unwrap();
        p.push(&[], Duration::from_millis(100)).await.unwrap();
    }
}
