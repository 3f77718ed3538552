//! Moving artifacts to the host that presents them.
//!
//! Same-host consumers get a filesystem path. Remote consumers receive the
//! bytes over the push protocol in [`wire`], served by [`PushReceiver`].

pub mod client;
pub mod receiver;
pub mod wire;


use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

pub use client::DeliveryClient;
pub use receiver::PushReceiver;

/// Where the consumer can find a delivered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveredReference {
    /// Path on this host
    Local(PathBuf),
    /// Path reported by the receiver on `host`
    Remote { host: String, path: String },
}

impl DeliveredReference {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl fmt::Display for DeliveredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { host, path } => write!(f, "{}:{}", host, path),
        }
    }
}

/// True when `host` names this machine: unset, `localhost`, or a loopback IP.
pub fn is_local_host(host: Option<&str>) -> bool {
    let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) else {
        return true;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
