//! Liveness probes: an ICMP echo through the platform `ping`, or TCP
//! connection attempts for networks that filter ICMP.
use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    process::Stdio,
    time::Duration,
};

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    process::Command,
    time,
};

use super::{is_resource_exhaustion, Liveness};
use crate::input::ProbeMethod;

/// Sends a single echo request by running the system `ping`.
///
/// Exit status zero means a reply arrived. The child is killed if the probe
/// future is dropped, so cancelled scans leave no processes behind.
#[derive(Debug, Clone, Default)]
pub struct Ping;

impl Ping {
    fn command(address: Ipv4Addr, timeout: Duration) -> Command {
        let mut command = Command::new("ping");

        #[cfg(windows)]
        {
            let wait = timeout.as_millis().to_string();
            command.args(["-n", "1", "-w", wait.as_str()]);
        }

        // -W takes milliseconds on the BSD ping
        #[cfg(any(target_os = "macos", target_os = "freebsd"))]
        {
            let wait = timeout.as_millis().max(1).to_string();
            command.args(["-c", "1", "-W", wait.as_str()]);
        }

        // and whole seconds on iputils and busybox
        #[cfg(not(any(windows, target_os = "macos", target_os = "freebsd")))]
        {
            let wait = wait_seconds(timeout).to_string();
            command.args(["-c", "1", "-W", wait.as_str()]);
        }

        command
            .arg(address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[cfg_attr(any(windows, target_os = "macos", target_os = "freebsd"), allow(dead_code))]
fn wait_seconds(timeout: Duration) -> u64 {
    let seconds = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    seconds.max(1)
}

impl Liveness for Ping {
    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> io::Result<bool> {
        let status = Self::command(address, timeout).status().await?;
        debug!("ping {address} exited with {status}");
        Ok(status.success())
    }
}

/// Attempts TCP connections to a handful of ports at once.
///
/// A completed handshake and an active refusal both prove that something
/// at the address answered. Silence on every port within the timeout
/// means the host is down.
#[derive(Debug, Clone)]
pub struct TcpConnect {
    ports: Vec<u16>,
}

impl TcpConnect {
    pub const fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    async fn connect(socket: SocketAddr) -> io::Result<bool> {
        match TcpStream::connect(socket).await {
            Ok(tcp_stream) => {
                debug!("Connection was successful, shutting down stream {socket}");
                if let Err(e) = { tcp_stream }.shutdown().await {
                    debug!("Shutdown stream error {e}");
                }
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Ok(true),
            Err(e) if is_resource_exhaustion(&e) => Err(e),
            Err(e) => {
                debug!("Connecting to {socket} failed: {e}");
                Ok(false)
            }
        }
    }
}

impl Default for TcpConnect {
    fn default() -> Self {
        Self::new(vec![80, 443, 22])
    }
}

impl Liveness for TcpConnect {
    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> io::Result<bool> {
        let mut attempts: FuturesUnordered<_> = self
            .ports
            .iter()
            .map(|&port| Self::connect(SocketAddr::from((address, port))))
            .collect();

        let first_answer = async {
            while let Some(attempt) = attempts.next().await {
                if attempt? {
                    return Ok(true);
                }
            }
            Ok::<_, io::Error>(false)
        };

        time::timeout(timeout, first_answer)
            .await
            .unwrap_or(Ok(false))
    }
}

/// The liveness probe selected on the command line.
#[derive(Debug, Clone)]
pub enum LivenessProbe {
    Ping(Ping),
    Tcp(TcpConnect),
}

impl LivenessProbe {
    pub fn pick(method: ProbeMethod, tcp_ports: &[u16]) -> Self {
        match method {
            ProbeMethod::Icmp => Self::Ping(Ping),
            ProbeMethod::Tcp => Self::Tcp(TcpConnect::new(tcp_ports.to_vec())),
        }
    }
}

impl Liveness for LivenessProbe {
    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> io::Result<bool> {
        match self {
            Self::Ping(ping) => ping.is_alive(address, timeout).await,
            Self::Tcp(tcp) => tcp.is_alive(address, timeout).await,
        }
    }
}
