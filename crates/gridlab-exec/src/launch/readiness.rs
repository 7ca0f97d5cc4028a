//! Waiting for the benchmark server to accept connections.
//!
//! The server ends its session after the first client disconnects, so on Linux readiness is
//! detected without connecting: the kernel's socket tables are polled for a listening socket on
//! the port. Elsewhere a TCP connect is used.
use std::time::{Duration, Instant};

use gridlab_model::ReadinessStrategy;
use tracing::{debug, trace};

use crate::ExecError;

/// Ports in LISTEN state found in a `/proc/net/tcp` or `/proc/net/tcp6` table.
pub(crate) fn listening_ports(table: &str) -> impl Iterator<Item = u16> + '_ {
    const TCP_LISTEN: &str = "0A";
    table.lines().skip(1).filter_map(|line| {
        let mut cols = line.split_whitespace();
        let local = cols.nth(1)?;
        let state = cols.nth(1)?;
        if state != TCP_LISTEN {
            return None;
        }
        let (_, port) = local.rsplit_once(':')?;
        u16::from_str_radix(port, 16).ok()
    })
}

#[cfg(target_os = "linux")]
async fn is_listening(port: u16) -> bool {
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(text) = tokio::fs::read_to_string(table).await {
            if listening_ports(&text).any(|p| p == port) {
                return true;
            }
        }
    }
    false
}

#[cfg(not(target_os = "linux"))]
async fn is_listening(port: u16) -> bool {
    tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// Block until the server on `port` is ready according to `strategy`; returns the time waited.
pub async fn wait_ready(strategy: &ReadinessStrategy, port: u16) -> Result<Duration, ExecError> {
    let start = Instant::now();
    match strategy {
        ReadinessStrategy::FixedDelay { delay_ms } => {
            debug!(port, delay_ms, "waiting a fixed delay for the server");
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            Ok(start.elapsed())
        }
        ReadinessStrategy::Probe { backoff, deadline_ms } => {
            let deadline = Duration::from_millis(*deadline_ms);
            let mut attempt = 0u32;
            loop {
                if is_listening(port).await {
                    let waited = start.elapsed();
                    debug!(port, attempt, waited_ms = waited.as_millis() as u64, "server is listening");
                    return Ok(waited);
                }
                let waited = start.elapsed();
                if waited >= deadline {
                    return Err(ExecError::NotReady {
                        port,
                        waited_ms: waited.as_millis() as u64,
                    });
                }
                let pause = backoff.delay_for(attempt).min(deadline - waited);
                trace!(port, attempt, pause_ms = pause.as_millis() as u64, "server not listening yet");
                tokio::time::sleep(pause).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
