//! HTTPS reachability probe
//!
//! A host counts as reachable only when the request answers with exactly
//! 200. Redirects, other 2xx codes, and transport failures all report
//! `false`.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe host must not be blank")]
    BlankHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// `https://<host>/<path>` with exactly one slash between the parts
pub fn probe_url(host: &str, path: &str) -> Result<String, ProbeError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(ProbeError::BlankHost);
    }
    let path = path.trim().trim_start_matches('/');
    Ok(format!("https://{}/{}", host, path))
}

pub struct HttpsProbe {
    agent: ureq::Agent,
}

impl Default for HttpsProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpsProbe {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub fn check(&self, host: &str, path: &str, method: Method) -> Result<bool, ProbeError> {
        let url = probe_url(host, path)?;
        let response = match method {
            Method::Get => self.agent.get(&url).call(),
            Method::Head => self.agent.head(&url).call(),
        };
        match response {
            Ok(resp) => Ok(resp.status().as_u16() == 200),
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_url() {
        assert_eq!(probe_url("example.com", "/health").unwrap(), "https://example.com/health");
        assert_eq!(probe_url(" example.com/ ", "status").unwrap(), "https://example.com/status");
        assert_eq!(probe_url("example.com", "").unwrap(), "https://example.com/");
    }

    #[test]
    fn test_blank_host_rejected() {
        assert!(matches!(probe_url("  ", "/x"), Err(ProbeError::BlankHost)));
        let probe = HttpsProbe::new(Duration::from_millis(100));
        assert!(matches!(probe.check("", "/", Method::Head), Err(ProbeError::BlankHost)));
    }

    #[test]
    fn test_unreachable_host_reports_false() {
        let probe = HttpsProbe::new(Duration::from_millis(500));
        // Reserved TLD, never resolves
        assert!(!probe.check("conbridge.invalid", "/", Method::Get).unwrap());
    }
}
