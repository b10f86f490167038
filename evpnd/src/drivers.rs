// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Standalone drivers: a dataplane that keeps the entries it is asked to program,
//! and a peer transport that logs the notifications it is given.

use evpn::dplane::{Dataplane, DataplaneError, LocalBinding};
use evpn::interface::IfIndex;
use evpn::peer::{PeerMsg, PeerTransport, TransportError};
use evpn::vni::Vni;
use mac_address::MacAddress;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::net::IpAddr;
use tracing::{debug, info};

/// A dataplane with no kernel behind it. It keeps the programmed entries.
#[derive(Debug, Default)]
pub struct LogDataplane {
    floods: HashSet<(Vni, IpAddr)>,
    macs: HashMap<(Vni, MacAddress), IpAddr>,
    neighs: HashMap<(Vni, IpAddr), MacAddress>,
}

impl LogDataplane {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dataplane for LogDataplane {
    fn install_replication_entry(&mut self, vni: Vni, vtep: IpAddr) -> Result<(), DataplaneError> {
        debug!("VNI {vni}: flood to {vtep}");
        self.floods.insert((vni, vtep));
        Ok(())
    }
    fn uninstall_replication_entry(
        &mut self,
        vni: Vni,
        vtep: IpAddr,
    ) -> Result<(), DataplaneError> {
        debug!("VNI {vni}: no flood to {vtep}");
        self.floods.remove(&(vni, vtep));
        Ok(())
    }
    fn install_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
        sticky: bool,
    ) -> Result<(), DataplaneError> {
        debug!("VNI {vni}: fdb {mac} -> {vtep} sticky {sticky}");
        self.macs.insert((vni, mac), vtep);
        Ok(())
    }
    fn uninstall_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
    ) -> Result<(), DataplaneError> {
        if self.macs.get(&(vni, mac)) != Some(&vtep) {
            return Err(DataplaneError::Refused(format!("no fdb {mac} -> {vtep}")));
        }
        debug!("VNI {vni}: fdb {mac} removed");
        self.macs.remove(&(vni, mac));
        Ok(())
    }
    fn install_remote_neigh(
        &mut self,
        vni: Vni,
        ip: IpAddr,
        mac: MacAddress,
    ) -> Result<(), DataplaneError> {
        debug!("VNI {vni}: neighbor {ip} -> {mac}");
        self.neighs.insert((vni, ip), mac);
        Ok(())
    }
    fn uninstall_remote_neigh(&mut self, vni: Vni, ip: IpAddr) -> Result<(), DataplaneError> {
        debug!("VNI {vni}: neighbor {ip} removed");
        self.neighs.remove(&(vni, ip));
        Ok(())
    }
    fn query_local_binding(&mut self, bridge: IfIndex, mac: MacAddress) -> Option<LocalBinding> {
        debug!("Bridge {bridge}: no local binding for {mac}");
        None
    }
}

impl Display for LogDataplane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " Programmed flood entries: {}", self.floods.len())?;
        for (vni, vtep) in &self.floods {
            writeln!(f, "  {vni:>8} {vtep}")?;
        }
        writeln!(f, " Programmed remote MACs: {}", self.macs.len())?;
        for ((vni, mac), vtep) in &self.macs {
            writeln!(f, "  {vni:>8} {mac} {vtep}")?;
        }
        writeln!(f, " Programmed remote neighbors: {}", self.neighs.len())?;
        for ((vni, ip), mac) in &self.neighs {
            writeln!(f, "  {vni:>8} {ip} {mac}")?;
        }
        Ok(())
    }
}

/// A peer transport that logs what it would send
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: u64,
}

impl LogTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl PeerTransport for LogTransport {
    fn send(&mut self, msg: PeerMsg) -> Result<(), TransportError> {
        info!("To peer: {msg}");
        self.sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use tracing_test::traced_test;

    #[test]
    fn log_dataplane_keeps_entries() {
        let vni = Vni::new_checked(100).unwrap();
        let vtep = IpAddr::from_str("10.0.0.2").unwrap();
        let mac = MacAddress::new([0x02, 0, 0, 0, 0, 1]);
        let mut dplane = LogDataplane::new();

        dplane.install_replication_entry(vni, vtep).unwrap();
        dplane.install_remote_mac(vni, mac, vtep, false).unwrap();
        assert_eq!(dplane.floods.len(), 1);
        assert_eq!(dplane.macs.get(&(vni, mac)), Some(&vtep));

        let other = IpAddr::from_str("10.0.0.3").unwrap();
        assert!(dplane.uninstall_remote_mac(vni, mac, other).is_err());
        dplane.uninstall_remote_mac(vni, mac, vtep).unwrap();
        dplane.uninstall_replication_entry(vni, vtep).unwrap();
        assert!(dplane.macs.is_empty());
        assert!(dplane.floods.is_empty());
        assert_eq!(dplane.query_local_binding(5, mac), None);
    }

    #[traced_test]
    #[test]
    fn log_transport_logs() {
        let mut transport = LogTransport::new();
        let vni = Vni::new_checked(100).unwrap();
        transport.send(PeerMsg::VniDel { vni }).unwrap();
        assert_eq!(transport.sent(), 1);
        assert!(logs_contain("To peer: VNI_DEL 100"));
    }
}
