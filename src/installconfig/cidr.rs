//! CIDR parsing and host arithmetic

use crate::error::{KvinstallError, KvinstallResult};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP network in `address/prefix` form, stored by its network address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn parse(value: &str) -> KvinstallResult<Self> {
        let invalid = |reason: &str| KvinstallError::Network {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (addr, prefix) = value
            .split_once('/')
            .ok_or_else(|| invalid("missing prefix length"))?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid("invalid address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("invalid prefix length"))?;

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid("prefix length out of range"));
        }

        Ok(Self {
            network: mask(addr, prefix),
            prefix,
        })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        ip.is_ipv4() == self.network.is_ipv4() && mask(ip, self.prefix) == self.network
    }

    /// The `n`th address of the network (0 is the network address)
    pub fn host(&self, n: u128) -> KvinstallResult<IpAddr> {
        let out_of_range = || KvinstallError::Network {
            value: self.to_string(),
            reason: format!("host {} is outside the network", n),
        };

        match self.network {
            IpAddr::V4(v4) => {
                let size = 1u128 << (32 - u32::from(self.prefix));
                if n >= size {
                    return Err(out_of_range());
                }
                let base = u32::from(v4) as u128;
                Ok(IpAddr::V4(Ipv4Addr::from((base + n) as u32)))
            }
            IpAddr::V6(v6) => {
                let host_bits = 128 - u32::from(self.prefix);
                if host_bits < 128 && n >= (1u128 << host_bits) {
                    return Err(out_of_range());
                }
                let base = u128::from(v6);
                base.checked_add(n)
                    .map(|v| IpAddr::V6(Ipv6Addr::from(v)))
                    .ok_or_else(out_of_range)
            }
        }
    }
}

impl FromStr for Cidr {
    type Err = KvinstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix))
            };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn contains_checks_prefix() {
        let cidr = Cidr::parse("192.168.123.0/24").unwrap();
        assert!(cidr.contains(ip("192.168.123.15")));
        assert!(!cidr.contains(ip("192.168.124.1")));
        assert!(!cidr.contains(ip("::1")));
    }

    #[test]
    fn host_bits_are_masked_on_parse() {
        let cidr = Cidr::parse("10.0.12.7/16").unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn nth_host() {
        let cidr = Cidr::parse("172.30.0.0/16").unwrap();
        assert_eq!(cidr.host(10).unwrap(), ip("172.30.0.10"));
        assert_eq!(cidr.host(1).unwrap(), ip("172.30.0.1"));
        assert!(Cidr::parse("10.0.0.0/30").unwrap().host(4).is_err());

        let v6 = Cidr::parse("fd02::/112").unwrap();
        assert_eq!(v6.host(10).unwrap(), ip("fd02::a"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Cidr::parse("10.0.0.0").is_err());
        assert!(Cidr::parse("10.0.0.0/33").is_err());
        assert!(Cidr::parse("nope/8").is_err());
    }
}
