// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Submodule to implement the MAC table of an EVPN instance.

use crate::dplane::LocalBinding;
use crate::esi::Esi;
use crate::interface::IfIndex;
use mac_address::MacAddress;
use std::collections::{BTreeSet, HashMap, hash_map};
use std::net::IpAddr;

/// Who owns a MAC
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacOrigin {
    /// Learnt (or configured) locally, possibly on an ES shared with peers.
    /// `ifindex` is None when the MAC is only known from a peer sync.
    Local { ifindex: Option<IfIndex> },
    /// Learnt from the peer behind some remote VTEP
    Remote { vtep: IpAddr },
    /// Not advertised by anyone; kept only because neighbors refer to it
    Auto,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacEntry {
    pub mac: MacAddress,
    pub origin: MacOrigin,
    pub es: Option<Esi>,
    pub sticky: bool,
    /// local default gateway (SVI / VRR) MAC
    pub def_gw: bool,
    /// gateway MAC advertised by a remote router
    pub remote_gw: bool,
    pub svi: bool,
    pub duplicate: bool,
    pub frozen: bool,
    /// a peer sharing the ES has this MAC locally active
    pub peer_active: bool,
    /// a peer sharing the ES proxies this MAC
    pub peer_proxy: bool,
    pub loc_seq: u32,
    pub rem_seq: u32,
    /// IPs of the neighbors bound to this MAC
    pub neighbors: BTreeSet<IpAddr>,
    /// local binding found while this MAC was frozen as a remote duplicate
    pub frozen_local: Option<LocalBinding>,
}

impl MacEntry {
    #[must_use]
    pub fn new(mac: MacAddress, origin: MacOrigin) -> Self {
        Self {
            mac,
            origin,
            es: None,
            sticky: false,
            def_gw: false,
            remote_gw: false,
            svi: false,
            duplicate: false,
            frozen: false,
            peer_active: false,
            peer_proxy: false,
            loc_seq: 0,
            rem_seq: 0,
            neighbors: BTreeSet::new(),
            frozen_local: None,
        }
    }
    #[must_use]
    pub fn new_local(mac: MacAddress, ifindex: Option<IfIndex>) -> Self {
        Self::new(mac, MacOrigin::Local { ifindex })
    }
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.origin, MacOrigin::Local { .. })
    }
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.origin, MacOrigin::Remote { .. })
    }
    #[must_use]
    pub fn remote_vtep(&self) -> Option<IpAddr> {
        match self.origin {
            MacOrigin::Remote { vtep } => Some(vtep),
            _ => None,
        }
    }
    /// A local MAC that peers on a shared ES also advertise
    #[must_use]
    pub fn is_peer_synced(&self) -> bool {
        self.peer_active || self.peer_proxy
    }
    pub fn clear_peer_sync(&mut self) {
        self.peer_active = false;
        self.peer_proxy = false;
    }
    /// The sequence number that an advertisement must beat to take over this MAC
    #[must_use]
    pub fn held_seq(&self) -> u32 {
        match self.origin {
            MacOrigin::Local { .. } => self.loc_seq,
            MacOrigin::Remote { .. } => self.rem_seq,
            MacOrigin::Auto => 0,
        }
    }
}

/// The MAC table of an EVPN instance, keyed by MAC address
#[derive(Debug, Default)]
pub struct MacTable(HashMap<MacAddress, MacEntry>);

#[allow(clippy::len_without_is_empty)]
impl MacTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lookup(&self, mac: &MacAddress) -> Option<&MacEntry> {
        self.0.get(mac)
    }

    pub fn lookup_mut(&mut self, mac: &MacAddress) -> Option<&mut MacEntry> {
        self.0.get_mut(mac)
    }

    /// Get the entry for a MAC, creating it with `origin` if absent
    pub fn insert_or_update(&mut self, mac: MacAddress, origin: MacOrigin) -> &mut MacEntry {
        self.0
            .entry(mac)
            .or_insert_with(|| MacEntry::new(mac, origin))
    }

    /// Store an entry, replacing any previous one for the same MAC
    pub fn insert(&mut self, entry: MacEntry) -> Option<MacEntry> {
        self.0.insert(entry.mac, entry)
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<MacEntry> {
        self.0.remove(mac)
    }

    pub fn values(&self) -> hash_map::Values<'_, MacAddress, MacEntry> {
        self.0.values()
    }

    /// MACs matching a predicate, so that callers can mutate the table afterwards
    #[must_use]
    pub fn keys_where(&self, pred: impl Fn(&MacEntry) -> bool) -> Vec<MacAddress> {
        self.0
            .values()
            .filter(|e| pred(e))
            .map(|e| e.mac)
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

    /// Number of MACs excluding placeholders nobody advertises
    #[must_use]
    pub fn num_valid(&self) -> usize {
        self.0
            .values()
            .filter(|e| e.origin != MacOrigin::Auto)
            .count()
    }
}
