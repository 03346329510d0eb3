use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use rand::random;
use surge_ping::{Client as PingClient, Config as PingConfig, ICMP, PingIdentifier, PingSequence};
use tokio::process::Command;
use tokio::time::Instant;

use super::Probe;
use crate::target::Target;
use crate::validation::ping_host;

const PAYLOAD: [u8; 32] = [0; 32];

/// ICMP echo probe.
///
/// Opening an ICMP socket needs privileges on most systems; when that fails
/// the system `ping` binary is used instead.
#[derive(Debug, Default)]
pub struct PingProbe;

#[async_trait::async_trait]
impl Probe for PingProbe {
    async fn check(&self, target: &Target) -> Result<Duration> {
        let host = ping_host(&target.address);
        let addr = resolve(host).await?;

        match icmp_client(addr) {
            Ok(client) => icmp_ping(&client, addr, target.timeout).await,
            Err(e) => {
                tracing::debug!(error = %e, "ICMP socket unavailable, using system ping");
                system_ping(addr, target.timeout).await
            }
        }
    }
}

async fn resolve(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .with_context(|| format!("DNS lookup failed for {host}"))?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| anyhow!("DNS lookup returned no addresses for {host}"))
}

fn icmp_client(addr: IpAddr) -> Result<PingClient> {
    let config = match addr {
        IpAddr::V4(_) => PingConfig::default(),
        IpAddr::V6(_) => PingConfig::builder().kind(ICMP::V6).build(),
    };
    PingClient::new(&config).context("failed to open ICMP socket")
}

async fn icmp_ping(client: &PingClient, addr: IpAddr, timeout: Duration) -> Result<Duration> {
    let mut pinger = client.pinger(addr, PingIdentifier(random())).await;
    pinger.timeout(timeout);

    match pinger.ping(PingSequence(0), &PAYLOAD).await {
        Ok((_reply, rtt)) => Ok(rtt),
        Err(e) => Err(anyhow!("ping failed: {e}")),
    }
}

/// Single-echo arguments for the platform `ping`, waiting at most `timeout`.
fn ping_args(addr: IpAddr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1).to_string();
    let mut args: Vec<String> = if cfg!(windows) {
        vec!["-n".into(), "1".into(), "-w".into(), millis]
    } else if cfg!(target_os = "macos") {
        // -W is in milliseconds here
        vec!["-c".into(), "1".into(), "-W".into(), millis]
    } else {
        vec!["-c".into(), "1".into(), "-W".into(), timeout.as_secs().max(1).to_string()]
    };
    args.push(addr.to_string());
    args
}

async fn system_ping(addr: IpAddr, timeout: Duration) -> Result<Duration> {
    let mut command = Command::new("ping");
    command
        .args(ping_args(addr, timeout))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let start = Instant::now();
    let output = command.output().await.context("failed to run ping")?;
    let elapsed = start.elapsed();

    if !output.status.success() {
        bail!("host unreachable");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_rtt(&stdout).unwrap_or(elapsed))
}

/// Pull the round-trip time out of a `time=12.3 ms` fragment.
fn parse_rtt(output: &str) -> Option<Duration> {
    let start = output.find("time=").or_else(|| output.find("time<"))? + 5;
    let value: String = output[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let millis: f64 = value.parse().ok()?;
    Some(Duration::from_secs_f64(millis / 1000.0))
}
