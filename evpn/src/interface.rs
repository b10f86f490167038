// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The interfaces an EVPN instance is bound to

use ipnet::IpNet;
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub type IfIndex = u32;

/// The VXLAN (bridge-facing) interface of an EVPN instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VxlanIf {
    pub ifindex: IfIndex,
    pub name: String,
    #[serde(default = "default_true")]
    pub oper_up: bool,
    /// ifindex of the bridge this interface is enslaved to
    #[serde(default)]
    pub bridge: Option<IfIndex>,
    #[serde(default)]
    pub access_vlan: u16,
}

fn default_true() -> bool {
    true
}

impl VxlanIf {
    #[must_use]
    pub fn new(name: &str, ifindex: IfIndex) -> Self {
        Self {
            ifindex,
            name: name.to_owned(),
            oper_up: true,
            bridge: None,
            access_vlan: 0,
        }
    }
    #[must_use]
    pub fn with_bridge(mut self, bridge: IfIndex) -> Self {
        self.bridge = Some(bridge);
        self
    }
    #[must_use]
    pub fn with_access_vlan(mut self, vlan: u16) -> Self {
        self.access_vlan = vlan;
        self
    }
    pub fn set_oper_up(&mut self, up: bool) {
        self.oper_up = up;
    }
    /// Up and enslaved to a bridge
    #[must_use]
    pub fn is_operative(&self) -> bool {
        self.oper_up && self.bridge.is_some()
    }
}

/// A routed interface (SVI or VRR) whose addresses may be advertised
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutedIf {
    pub ifindex: IfIndex,
    pub name: String,
    pub mac: MacAddress,
    #[serde(default)]
    pub addresses: Vec<IpNet>,
}

impl RoutedIf {
    #[must_use]
    pub fn new(name: &str, ifindex: IfIndex, mac: MacAddress) -> Self {
        Self {
            ifindex,
            name: name.to_owned(),
            mac,
            addresses: vec![],
        }
    }
    #[must_use]
    pub fn with_address(mut self, address: IpNet) -> Self {
        self.add_address(address);
        self
    }
    pub fn add_address(&mut self, address: IpNet) {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
    }
    pub fn del_address(&mut self, address: &IpNet) {
        self.addresses.retain(|a| a != address);
    }
    /// The host addresses configured on this interface
    pub fn ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addresses.iter().map(IpNet::addr)
    }
}

/// Tell if an address is link-local (169.254/16 or fe80::/10)
#[must_use]
pub fn is_link_local(address: &IpAddr) -> bool {
    match address {
        IpAddr::V4(a) => a.is_link_local(),
        IpAddr::V6(a) => a.is_unicast_link_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn vxlan_if_operative() {
        let mut vxlan = VxlanIf::new("vxlan100", 10);
        assert!(!vxlan.is_operative(), "Not bridged");
        vxlan = vxlan.with_bridge(5);
        assert!(vxlan.is_operative());
        vxlan.set_oper_up(false);
        assert!(!vxlan.is_operative());
    }

    #[test]
    fn routed_if_addresses() {
        let mac = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
        let mut svi = RoutedIf::new("vlan100", 20, mac)
            .with_address(IpNet::from_str("10.1.1.1/24").unwrap())
            .with_address(IpNet::from_str("10.1.1.1/24").unwrap())
            .with_address(IpNet::from_str("fe80::1/64").unwrap());
        assert_eq!(svi.addresses.len(), 2, "Duplicates are not stored");
        let ips: Vec<IpAddr> = svi.ips().collect();
        assert_eq!(ips[0], IpAddr::from_str("10.1.1.1").unwrap());

        svi.del_address(&IpNet::from_str("fe80::1/64").unwrap());
        assert_eq!(svi.addresses.len(), 1);
    }

    #[test]
    fn link_local_detection() {
        assert!(is_link_local(&IpAddr::from_str("fe80::1").unwrap()));
        assert!(is_link_local(&IpAddr::from_str("169.254.0.1").unwrap()));
        assert!(!is_link_local(&IpAddr::from_str("10.1.1.1").unwrap()));
        assert!(!is_link_local(&IpAddr::from_str("2001:db8::1").unwrap()));
    }
}
