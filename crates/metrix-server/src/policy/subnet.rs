//! CIDR compilation and matching for the trusted subnet guard.

use std::net::IpAddr;

use metrix_core::error::{MetrixError, Result};

/// Compiled CIDR block. The network part is stored pre-masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedSubnet {
    V4 { net: u32, prefix: u8 },
    V6 { net: u128, prefix: u8 },
}

fn mask_v4(prefix: u8) -> u32 {
    if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) }
}

fn mask_v6(prefix: u8) -> u128 {
    if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) }
}

impl TrustedSubnet {
    /// Parse `addr/prefix`, e.g. `192.168.0.0/24` or `fd00::/8`.
    pub fn parse(raw: &str) -> Result<Self> {
        let bad = |why: &str| MetrixError::BadRequest(format!("invalid trusted_subnet {raw:?}: {why}"));

        let (addr, prefix) = raw.trim().split_once('/').ok_or_else(|| bad("expected addr/prefix"))?;
        let addr: IpAddr = addr.parse().map_err(|_| bad("bad address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| bad("bad prefix length"))?;

        match addr {
            IpAddr::V4(a) => {
                if prefix > 32 {
                    return Err(bad("prefix length above 32"));
                }
                Ok(TrustedSubnet::V4 { net: u32::from(a) & mask_v4(prefix), prefix })
            }
            IpAddr::V6(a) => {
                if prefix > 128 {
                    return Err(bad("prefix length above 128"));
                }
                Ok(TrustedSubnet::V6 { net: u128::from(a) & mask_v6(prefix), prefix })
            }
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (*self, ip) {
            (TrustedSubnet::V4 { net, prefix }, IpAddr::V4(a)) => u32::from(a) & mask_v4(prefix) == net,
            (TrustedSubnet::V4 { net, prefix }, IpAddr::V6(a)) => match a.to_ipv4_mapped() {
                Some(a) => u32::from(a) & mask_v4(prefix) == net,
                None => false,
            },
            (TrustedSubnet::V6 { net, prefix }, IpAddr::V6(a)) => u128::from(a) & mask_v6(prefix) == net,
            (TrustedSubnet::V6 { .. }, IpAddr::V4(_)) => false,
        }
    }

    /// Check a raw `X-Real-IP` header value; unparseable input is outside.
    pub fn admits(&self, raw: &str) -> bool {
        raw.trim().parse::<IpAddr>().map(|ip| self.contains(ip)).unwrap_or(false)
    }
}
