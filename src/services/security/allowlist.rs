use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("invalid allow-list entry '{0}' (expected CIDR or IP address)")]
    InvalidEntry(String),
}

/// Network prefixes allowed to reach the service.
///
/// Compiled once at startup and shared read-only. An empty list permits everyone.
#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    nets: Vec<IpNet>,
}

impl IpAllowList {
    pub fn compile<S: AsRef<str>>(entries: &[S]) -> Result<Self, AllowListError> {
        let nets = entries
            .iter()
            .map(|e| e.as_ref().trim())
            .filter(|e| !e.is_empty())
            .map(|e| {
                e.parse::<IpNet>()
                    .or_else(|_| e.parse::<IpAddr>().map(IpNet::from))
                    .map(|net| net.trunc())
                    .map_err(|_| AllowListError::InvalidEntry(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { nets })
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// An unknown client address is only permitted when the list is empty.
    pub fn permits(&self, ip: Option<IpAddr>) -> bool {
        if self.nets.is_empty() {
            return true;
        }
        let Some(ip) = ip else {
            return false;
        };
        let ip = ip.to_canonical();
        self.nets.iter().any(|net| net.contains(&ip))
    }
}
