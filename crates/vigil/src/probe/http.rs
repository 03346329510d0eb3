use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;

use super::{Probe, TIMEOUT_ERROR};
use crate::target::Target;

/// HTTP/HTTPS liveness probe.
///
/// Any response counts as up, whatever its status code; only transport
/// failures and timeouts are down.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn check(&self, target: &Target) -> Result<Duration> {
        let start = Instant::now();

        let response = self
            .client
            .get(&target.address)
            .timeout(target.timeout)
            .send()
            .await
            .map_err(describe)?;

        let latency = start.elapsed();
        tracing::trace!(
            target_id = %target.id,
            status = response.status().as_u16(),
            latency_ms = latency.as_millis() as u64,
            "HTTP probe answered"
        );
        Ok(latency)
    }
}

fn describe(e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!(TIMEOUT_ERROR)
    } else if e.is_connect() {
        anyhow!("connection failed: {}", root_cause(&e))
    } else if e.is_redirect() {
        anyhow!("too many redirects")
    } else {
        anyhow!("HTTP request failed: {}", root_cause(&e))
    }
}

/// reqwest wraps the interesting part (DNS, refused, TLS) several levels deep.
fn root_cause(e: &(dyn std::error::Error + 'static)) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
