use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::Probe;
use crate::target::Target;
use crate::validation::split_host_port;

/// TCP connect probe. Name resolution happens inside the executor deadline.
pub struct TcpProbe;

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn check(&self, target: &Target) -> Result<Duration> {
        let (host, port) = split_host_port(&target.address).map_err(|e| anyhow!(e))?;
        let start = Instant::now();

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| anyhow!("TCP connection failed: {e}"))?;

        let latency = start.elapsed();
        drop(stream);
        Ok(latency)
    }
}
