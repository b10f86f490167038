// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Submodule to implement the neighbor (ARP/ND) table of an EVPN instance.

use crate::esi::Esi;
use mac_address::MacAddress;
use std::collections::{HashMap, hash_map};
use std::net::IpAddr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NeighOrigin {
    Local,
    Remote { vtep: IpAddr },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NeighEntry {
    pub ip: IpAddr,
    pub mac: MacAddress,
    pub origin: NeighOrigin,
    pub active: bool,
    pub def_gw: bool,
    pub peer_active: bool,
    pub peer_proxy: bool,
    pub es: Option<Esi>,
    pub loc_seq: u32,
    pub rem_seq: u32,
}

impl NeighEntry {
    #[must_use]
    pub fn new(ip: IpAddr, mac: MacAddress, origin: NeighOrigin) -> Self {
        Self {
            ip,
            mac,
            origin,
            active: false,
            def_gw: false,
            peer_active: false,
            peer_proxy: false,
            es: None,
            loc_seq: 0,
            rem_seq: 0,
        }
    }
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin == NeighOrigin::Local
    }
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.origin, NeighOrigin::Remote { .. })
    }
    #[must_use]
    pub fn held_seq(&self) -> u32 {
        match self.origin {
            NeighOrigin::Local => self.loc_seq,
            NeighOrigin::Remote { .. } => self.rem_seq,
        }
    }
    pub fn clear_peer_sync(&mut self) {
        self.peer_active = false;
        self.peer_proxy = false;
    }
}

/// The neighbor table of an EVPN instance, keyed by IP address
#[derive(Debug, Default)]
pub struct NeighTable(HashMap<IpAddr, NeighEntry>);

#[allow(clippy::len_without_is_empty)]
impl NeighTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, ip: &IpAddr) -> Option<&NeighEntry> {
        self.0.get(ip)
    }

    pub fn lookup_mut(&mut self, ip: &IpAddr) -> Option<&mut NeighEntry> {
        self.0.get_mut(ip)
    }

    /// Get the entry for an IP, creating it if absent
    pub fn insert_or_update(
        &mut self,
        ip: IpAddr,
        mac: MacAddress,
        origin: NeighOrigin,
    ) -> &mut NeighEntry {
        self.0
            .entry(ip)
            .or_insert_with(|| NeighEntry::new(ip, mac, origin))
    }

    pub fn insert(&mut self, entry: NeighEntry) -> Option<NeighEntry> {
        self.0.insert(entry.ip, entry)
    }

    pub fn remove(&mut self, ip: &IpAddr) -> Option<NeighEntry> {
        self.0.remove(ip)
    }

    pub fn values(&self) -> hash_map::Values<'_, IpAddr, NeighEntry> {
        self.0.values()
    }

    #[must_use]
    pub fn keys_where(&self, pred: impl Fn(&NeighEntry) -> bool) -> Vec<IpAddr> {
        self.0
            .values()
            .filter(|e| pred(e))
            .map(|e| e.ip)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::tests::mk_mac;
    use std::str::FromStr;

    #[test]
    fn neigh_table_basic() {
        let mut table = NeighTable::new();
        let ip1 = IpAddr::from_str("10.1.1.10").unwrap();
        let ip2 = IpAddr::from_str("2001:db8::10").unwrap();
        let vtep = IpAddr::from_str("10.0.0.2").unwrap();

        let n = table.insert_or_update(ip1, mk_mac(1), NeighOrigin::Remote { vtep });
        n.rem_seq = 5;
        let n = table.insert_or_update(ip1, mk_mac(9), NeighOrigin::Local);
        assert_eq!(n.mac, mk_mac(1), "Existing entry is kept");
        assert_eq!(n.held_seq(), 5);

        let mut local = NeighEntry::new(ip2, mk_mac(2), NeighOrigin::Local);
        local.loc_seq = 2;
        local.peer_active = true;
        table.insert(local);
        assert_eq!(table.len(), 2);
        assert_eq!(table.keys_where(NeighEntry::is_local), vec![ip2]);

        let n = table.lookup_mut(&ip2).unwrap();
        n.clear_peer_sync();
        assert!(!n.peer_active);
        assert_eq!(n.held_seq(), 2);

        assert!(table.remove(&ip1).is_some());
        assert!(table.lookup(&ip1).is_none());
        assert!(table.remove(&ip2).is_some());
        assert!(table.is_empty());
    }
}
