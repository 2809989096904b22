// # IP Source Trait
//
// Defines the interface for answering "what is my current public IP".
//
// ## Implementations
//
// - Consensus over HTTP authorities: `ddns-ip-consensus` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{IpFamily, IpSource};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let ip = source.current(IpFamily::V4).await?;
//     println!("public IP: {}", ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Family of a concrete address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// Whether `ip` belongs to this family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        Self::of(ip) == *self
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("v4"),
            IpFamily::V6 => f.write_str("v6"),
        }
    }
}

impl std::str::FromStr for IpFamily {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(IpFamily::V4),
            "v6" | "ipv6" | "6" => Ok(IpFamily::V6),
            other => Err(crate::Error::config(format!(
                "Unknown IP family '{}'. Valid values: v4, v6",
                other
            ))),
        }
    }
}

/// Trait for public IP sources
///
/// Implementations must be thread-safe and usable across async tasks. A
/// source answers one question per call and keeps no history; deciding what
/// to do with the answer belongs to the caller.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IP address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: An address of the requested family
    /// - `Err(Error)`: If the address could not be established
    async fn current(&self, family: IpFamily) -> Result<IpAddr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_of_and_parse() {
        let v4: IpAddr = "203.0.113.42".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(IpFamily::of(&v4), IpFamily::V4);
        assert!(IpFamily::V6.matches(&v6));
        assert!(!IpFamily::V6.matches(&v4));

        assert_eq!("IPv6".parse::<IpFamily>().unwrap(), IpFamily::V6);
        assert_eq!("4".parse::<IpFamily>().unwrap(), IpFamily::V4);
        assert!("v5".parse::<IpFamily>().is_err());
    }
}
