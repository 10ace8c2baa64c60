//! Listening-socket enumeration.
//!
//! The primary backend reads the OS connection table directly. When
//! the table is off limits (macOS without elevated rights, containers
//! with a masked /proc), a fallback shells out to `lsof` and parses
//! its field output. Both backends implement the same capability
//! interface; everything downstream sees one merged, labelled list.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};
use sysinfo::{Pid, System};
use tokio::process::Command;

use crate::error::{DiscoverError, Result};
use crate::lsof;
use crate::resolve;
use crate::types::ServiceRecord;

/// How long the `lsof` fallback may run before it is abandoned.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// A raw listening socket as reported by a backend, before
/// deduplication and labelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub port: u16,
    pub pid: Option<u32>,
    pub process: String,
}

/// Capability interface over "list local TCP sockets in LISTEN state".
#[async_trait]
pub trait SocketSource: Send + Sync {
    async fn listening_sockets(&self) -> Result<Vec<Listener>>;
}

// ── Backends ──────────────────────────────────────────────────────

/// Primary backend: the OS connection table via netstat2, with process
/// names resolved through sysinfo.
pub struct NetstatSource;

#[async_trait]
impl SocketSource for NetstatSource {
    async fn listening_sockets(&self) -> Result<Vec<Listener>> {
        let families = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
        let sockets = get_sockets_info(families, ProtocolFlags::TCP)
            .map_err(|err| classify_enumeration_error(&err.to_string()))?;
        let system = System::new_all();

        let mut listeners = Vec::new();
        for socket in sockets {
            let tcp = match &socket.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) if tcp.state == TcpState::Listen => tcp,
                _ => continue,
            };
            if !is_local_binding(tcp.local_addr) {
                continue;
            }

            let pid = socket.associated_pids.first().copied();
            let process = pid
                .and_then(|pid| system.process(Pid::from_u32(pid)))
                .map(|process| process.name().to_string_lossy().into_owned())
                .unwrap_or_default();
            listeners.push(Listener {
                port: tcp.local_port,
                pid,
                process,
            });
        }
        Ok(listeners)
    }
}

/// Bindings treated as local: the loopback and wildcard addresses
/// exactly, the same set the `lsof` fallback admits. A listener bound
/// elsewhere in 127.0.0.0/8 is not reported.
fn is_local_binding(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST || v4 == Ipv4Addr::UNSPECIFIED,
        IpAddr::V6(v6) => v6 == Ipv6Addr::LOCALHOST || v6 == Ipv6Addr::UNSPECIFIED,
    }
}

/// Sort access failures apart from everything else; only the former
/// mean the fallback backend could do better.
fn classify_enumeration_error(text: &str) -> DiscoverError {
    let lowered = text.to_ascii_lowercase();
    let denied = ["denied", "permission", "not permitted"]
        .iter()
        .any(|needle| lowered.contains(needle));
    if denied {
        DiscoverError::PermissionDenied(text.to_string())
    } else {
        DiscoverError::Enumeration(text.to_string())
    }
}

/// Fallback backend: `lsof` as a subprocess, for hosts where reading
/// the connection table needs more privilege than we have.
pub struct LsofSource;

#[async_trait]
impl SocketSource for LsofSource {
    async fn listening_sockets(&self) -> Result<Vec<Listener>> {
        let output = tokio::time::timeout(
            FALLBACK_TIMEOUT,
            Command::new("lsof")
                .args(["-iTCP", "-sTCP:LISTEN", "-nP", "-F", "pcn"])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| DiscoverError::Enumeration("lsof timed out".to_string()))?
        .map_err(|err| DiscoverError::Enumeration(format!("lsof failed to start: {err}")))?;

        // lsof exits non-zero when nothing matches; only treat a run
        // with no output at all as a failure
        if !output.status.success() && output.stdout.is_empty() {
            return Err(DiscoverError::Enumeration(format!(
                "lsof exited with {}",
                output.status
            )));
        }
        Ok(lsof::parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

// ── Enumerator ────────────────────────────────────────────────────

/// Runs the backend ladder, dedupes ports, drops the dashboard's own
/// port, and attaches display labels.
pub struct PortEnumerator {
    primary: Box<dyn SocketSource>,
    fallback: Box<dyn SocketSource>,
}

impl PortEnumerator {
    pub fn new() -> Self {
        Self::with_sources(Box::new(NetstatSource), Box::new(LsofSource))
    }

    /// Backend injection seam, used by tests.
    pub fn with_sources(primary: Box<dyn SocketSource>, fallback: Box<dyn SocketSource>) -> Self {
        Self { primary, fallback }
    }

    /// Produce the base record list: one record per distinct listening
    /// port (first sighting wins), `exclude_port` dropped, ascending
    /// by port. Backend failures degrade to an empty list, never an
    /// error.
    pub async fn enumerate(&self, exclude_port: u16) -> Vec<ServiceRecord> {
        let listeners = match self.primary.listening_sockets().await {
            Ok(listeners) => listeners,
            Err(DiscoverError::PermissionDenied(reason)) => {
                tracing::debug!(%reason, "Connection table denied, trying lsof fallback");
                self.fallback_sockets().await
            }
            Err(err) => {
                tracing::warn!(error = %err, "Primary enumeration failed, trying lsof fallback");
                self.fallback_sockets().await
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for listener in listeners {
            if listener.port == exclude_port || !seen.insert(listener.port) {
                continue;
            }
            let label = resolve::resolve(listener.port, &listener.process);
            records.push(ServiceRecord::new(listener.port, listener.process, label));
        }
        records.sort_by_key(|record| record.port);
        records
    }

    async fn fallback_sockets(&self) -> Vec<Listener> {
        match self.fallback.listening_sockets().await {
            Ok(listeners) => listeners,
            Err(err) => {
                tracing::warn!(error = %err, "Fallback enumeration failed, reporting no services");
                Vec::new()
            }
        }
    }
}

impl Default for PortEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
