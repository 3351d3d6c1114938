use crate::error::ShortenerError;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

/// A CIDR block such as `10.0.0.0/8`; callers inside it may read statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedSubnet {
    network: IpAddr,
    prefix: u8,
}

impl TrustedSubnet {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(network), IpAddr::V4(ip)) => {
                mask_v4(u32::from(ip), self.prefix) == u32::from(network)
            }
            (IpAddr::V6(network), IpAddr::V6(ip)) => {
                mask_v6(u128::from(ip), self.prefix) == u128::from(network)
            }
            _ => false,
        }
    }
}

fn mask_v4(bits: u32, prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        _ => bits & (u32::MAX << (32 - u32::from(prefix))),
    }
}

fn mask_v6(bits: u128, prefix: u8) -> u128 {
    match prefix {
        0 => 0,
        _ => bits & (u128::MAX << (128 - u32::from(prefix))),
    }
}

impl FromStr for TrustedSubnet {
    type Err = ShortenerError;

    fn from_str(cidr: &str) -> Result<Self, Self::Err> {
        let invalid = || ShortenerError::InvalidSubnet(cidr.to_string());

        let (network, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
        let network: IpAddr = network.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

        let network = match network {
            IpAddr::V4(v4) if prefix <= 32 => IpAddr::V4(mask_v4(v4.into(), prefix).into()),
            IpAddr::V6(v6) if prefix <= 128 => IpAddr::V6(mask_v6(v6.into(), prefix).into()),
            _ => return Err(invalid()),
        };

        Ok(Self { network, prefix })
    }
}

impl Display for TrustedSubnet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
