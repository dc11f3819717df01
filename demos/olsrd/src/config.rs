use std::net::Ipv4Addr;

use olsr::framework::ProtocolParams;
use serde::{Deserialize, Serialize};

/// RFC 3626, Section 3.1. OLSR uses UDP port 698
pub const OLSR_PORT: u16 = 698;

fn default_port() -> u16 {
    OLSR_PORT
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InterfaceConfig {
    pub name: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl InterfaceConfig {
    pub fn netmask(&self) -> u32 {
        match self.prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len.min(32))),
        }
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !self.netmask())
    }

    /// whether `peer` is on the same subnet as this interface
    pub fn contains(&self, peer: Ipv4Addr) -> bool {
        let mask = self.netmask();
        u32::from(peer) & mask == u32::from(self.address) & mask
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DaemonConfig {
    /// defaults to the address of the first interface
    #[serde(default)]
    pub main_address: Option<Ipv4Addr>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub params: ProtocolParams,
}

impl DaemonConfig {
    pub fn main_address(&self) -> Option<Ipv4Addr> {
        self.main_address
            .or_else(|| self.interfaces.first().map(|i| i.address))
    }

    /// interface that `peer` can be reached on directly
    pub fn interface_for(&self, peer: Ipv4Addr) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|i| i.contains(peer))
    }
}
