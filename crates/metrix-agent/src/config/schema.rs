use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use metrix_core::error::{MetrixError, Result};
use metrix_core::signer::SigningConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub signing: SigningConfig,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetrixError::BadRequest(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.agent.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Metrics per `/updates` request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,

    /// Sent as `X-Real-IP` on every push.
    #[serde(default)]
    pub real_ip: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_secs: default_poll_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
            batch_size: default_batch_size(),
            push_timeout_ms: default_push_timeout_ms(),
            real_ip: None,
        }
    }
}

impl AgentSection {
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(MetrixError::EmptyUrl);
        }
        if !(1..=3600).contains(&self.poll_interval_secs) {
            return Err(MetrixError::BadRequest(
                "agent.poll_interval_secs must be between 1 and 3600".into(),
            ));
        }
        if !(1..=3600).contains(&self.report_interval_secs) {
            return Err(MetrixError::BadRequest(
                "agent.report_interval_secs must be between 1 and 3600".into(),
            ));
        }
        if !(1..=10000).contains(&self.batch_size) {
            return Err(MetrixError::BadRequest(
                "agent.batch_size must be between 1 and 10000".into(),
            ));
        }
        if !(100..=600000).contains(&self.push_timeout_ms) {
            return Err(MetrixError::BadRequest(
                "agent.push_timeout_ms must be between 100 and 600000".into(),
            ));
        }
        if let Some(ip) = &self.real_ip {
            ip.parse::<IpAddr>().map_err(|_| {
                MetrixError::BadRequest(format!("agent.real_ip {ip:?} is not an IP address"))
            })?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}

fn default_server_url() -> String {
    "localhost:8080".into()
}
fn default_poll_interval_secs() -> u64 {
    2
}
fn default_report_interval_secs() -> u64 {
    10
}
fn default_batch_size() -> usize {
    100
}
fn default_push_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::super::load_from_str;

    #[test]
    fn defaults() {
        let cfg = load_from_str("version: 1\n").unwrap();
        assert_eq!(cfg.agent.server_url, "localhost:8080");
        assert_eq!(cfg.agent.poll_interval_secs, 2);
        assert_eq!(cfg.agent.report_interval_secs, 10);
        assert_eq!(cfg.agent.batch_size, 100);
        assert_eq!(cfg.agent.push_timeout().as_millis(), 5000);
        assert!(cfg.agent.real_ip.is_none());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = load_from_str("version: 1\nagent:\n  poll_intervall_secs: 3\n").unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn ranges_are_enforced() {
        for bad in [
            "version: 1\nagent:\n  poll_interval_secs: 0\n",
            "version: 1\nagent:\n  report_interval_secs: 7200\n",
            "version: 1\nagent:\n  batch_size: 0\n",
            "version: 1\nagent:\n  push_timeout_ms: 10\n",
            "version: 1\nagent:\n  real_ip: \"not-an-ip\"\n",
        ] {
            assert!(load_from_str(bad).is_err(), "{bad}");
        }
        assert!(load_from_str("version: 1\nagent:\n  server_url: \"\"\n").is_err());
    }
}
