//! Target address handling: `host:port` splitting and network selection.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{KeypinError, Result};

/// Split `host:port`, accepting bracketed IPv6 literals (`[::1]:443`).
///
/// Returns the reason as an error when `address` is not in that form:
/// no port, more than one colon outside brackets, or stray brackets.
pub fn split_host_port(address: &str) -> std::result::Result<(&str, &str), &'static str> {
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")?;
        let host = &rest[..end];
        let port = rest[end + 1..].strip_prefix(':').ok_or("missing port in address")?;
        (host, port)
    } else {
        let (host, port) = address.rsplit_once(':').ok_or("missing port in address")?;
        if host.contains(':') {
            return Err("too many colons in address");
        }
        (host, port)
    };

    if host.contains(['[', ']']) {
        return Err("unexpected '[' or ']' in host");
    }
    if port.contains(['[', ']']) {
        return Err("unexpected '[' or ']' in port");
    }
    Ok((host, port))
}

/// Host part of a `host` or `host:port` target.
///
/// When the address cannot be split it is treated as a bare host.
#[must_use]
pub fn target_host(address: &str) -> &str {
    split_host_port(address).map_or(address, |(host, _)| host)
}

/// Split a dial target into host and numeric port.
pub fn parse_dial_target(address: &str) -> Result<(&str, u16)> {
    let (host, port) = split_host_port(address).map_err(|reason| KeypinError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    })?;
    let port = port.parse().map_err(|_| KeypinError::InvalidAddress {
        address: address.to_string(),
        reason: format!("invalid port {port:?}"),
    })?;
    Ok((host, port))
}

/// Stream network a dial is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// IPv4 or IPv6
    #[default]
    Tcp,
    /// IPv4 only
    Tcp4,
    /// IPv6 only
    Tcp6,
}

impl Network {
    /// Whether a resolved address may be used on this network
    #[must_use]
    pub const fn permits(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Tcp => true,
            Self::Tcp4 => addr.is_ipv4(),
            Self::Tcp6 => addr.is_ipv6(),
        }
    }

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
        }
    }
}

impl FromStr for Network {
    type Err = KeypinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            other => Err(KeypinError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
