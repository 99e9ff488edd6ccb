//! # IPv4 Address Ranges
//!
//! Parses the CDN's published CIDR blocks and turns them into ascending `u32`
//! intervals that can be walked and tested against the classification bitmaps.
//!
//! Only IPv4 ranges are enumerable. An IPv6 block in a range file is rejected
//! rather than skipped, so a bad file never yields a partial candidate list.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use ipnet::{IpNet, Ipv4Net};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid CIDR '{0}': expected <address>/<prefix>")]
    MissingPrefix(String),
    #[error("invalid CIDR '{0}'")]
    Invalid(String),
    #[error("only IPv4 ranges are supported, got '{0}'")]
    Ipv6Unsupported(String),
}

/// An IPv4 network block, e.g. `104.16.0.0/13`.
///
/// The host bits of the written address are masked off, so `1.1.1.7/24` and
/// `1.1.1.0/24` describe the same interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    net: Ipv4Net,
}

impl AddressRange {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, RangeError> {
        let net = Ipv4Net::new(addr, prefix)
            .map_err(|_| RangeError::Invalid(format!("{addr}/{prefix}")))?;
        Ok(Self { net: net.trunc() })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.net.network()
    }

    /// First address of the block as its big-endian integer.
    pub fn start(&self) -> u32 {
        u32::from(self.net.network())
    }

    /// Last address of the block (inclusive).
    pub fn end(&self) -> u32 {
        u32::from(self.net.broadcast())
    }

    /// Walks the block in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u32> + Clone {
        self.start()..=self.end()
    }
}

impl FromStr for AddressRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.contains('/') {
            return Err(RangeError::MissingPrefix(s.to_string()));
        }

        match s.parse::<IpNet>() {
            Ok(IpNet::V4(net)) => Self::new(net.addr(), net.prefix_len()),
            Ok(IpNet::V6(_)) => Err(RangeError::Ipv6Unsupported(s.to_string())),
            Err(_) => Err(RangeError::Invalid(s.to_string())),
        }
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

/// Parses range-file text: one CIDR per line, blank lines and `#` comments ignored.
pub fn parse_ranges(text: &str) -> Result<Vec<AddressRange>, RangeError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(AddressRange::from_str)
        .collect()
}

/// Reads and parses a range file. Any malformed entry fails the whole file.
pub fn read_range_file(path: &Path) -> anyhow::Result<Vec<AddressRange>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading range file {}", path.display()))?;
    let ranges =
        parse_ranges(&text).with_context(|| format!("parsing range file {}", path.display()))?;
    Ok(ranges)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
