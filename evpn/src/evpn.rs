// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Submodule to represent the control-plane state of one EVPN (L2 VNI) instance

use crate::dplane::{Dataplane, DataplaneError};
use crate::domain::VrfId;
use crate::esi::Esi;
use crate::interface::{IfIndex, RoutedIf, VxlanIf};
use crate::mac::{MacEntry, MacOrigin, MacTable};
use crate::neigh::{NeighEntry, NeighTable};
use crate::vni::Vni;
use crate::vtep::{FloodMode, RemoteVtep, VtepSet, vtep_install, vtep_uninstall};
use mac_address::MacAddress;
use std::collections::BTreeSet;
use std::net::IpAddr;

#[allow(unused)]
use tracing::{debug, error, warn};

/// Log a failed dataplane request. Failures never affect control-plane state.
pub(crate) fn dplane_log(vni: Vni, what: &str, result: Result<(), DataplaneError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!("VNI {vni}: failed to {what}: {e}");
            false
        }
    }
}

/// An EVPN instance
#[derive(Debug)]
pub struct Evpn {
    pub vni: Vni,
    /// tenant vrf
    pub vrf_id: VrfId,
    pub local_vtep: Option<IpAddr>,
    pub mcast_grp: Option<IpAddr>,
    pub vxlan_if: Option<VxlanIf>,
    pub svi: Option<RoutedIf>,
    pub vrr: Option<RoutedIf>,
    pub advertise_gw_macip: bool,
    pub advertise_svi_macip: bool,
    pub advertise_subnet: bool,
    pub macs: MacTable,
    pub neighs: NeighTable,
    pub vteps: VtepSet,
    /// ethernet segments local to this router that carry this VNI
    pub es_evis: BTreeSet<Esi>,
    pub(crate) ready_for_peer: bool,
}

impl Evpn {
    #[must_use]
    pub fn new(vni: Vni) -> Self {
        Self {
            vni,
            vrf_id: 0,
            local_vtep: None,
            mcast_grp: None,
            vxlan_if: None,
            svi: None,
            vrr: None,
            advertise_gw_macip: false,
            advertise_svi_macip: false,
            advertise_subnet: false,
            macs: MacTable::new(),
            neighs: NeighTable::new(),
            vteps: VtepSet::new(),
            es_evis: BTreeSet::new(),
            ready_for_peer: false,
        }
    }

    /// The instance has been announced to the peer
    #[must_use]
    pub fn is_ready_for_peer(&self) -> bool {
        self.ready_for_peer
    }

    /// The vxlan interface is up and enslaved to a bridge
    #[must_use]
    pub fn is_operative(&self) -> bool {
        self.vxlan_if.as_ref().is_some_and(VxlanIf::is_operative)
    }

    #[must_use]
    pub fn bridge(&self) -> Option<IfIndex> {
        self.vxlan_if.as_ref().and_then(|vxlan| vxlan.bridge)
    }

    #[must_use]
    pub fn svi_ifindex(&self) -> IfIndex {
        self.svi.as_ref().map_or(0, |svi| svi.ifindex)
    }

    /// The routed interface with the given ifindex, if it is this instance's SVI or VRR
    #[must_use]
    pub fn routed_if(&self, ifindex: IfIndex) -> Option<&RoutedIf> {
        [self.svi.as_ref(), self.vrr.as_ref()]
            .into_iter()
            .flatten()
            .find(|ifp| ifp.ifindex == ifindex)
    }

    /////////////////////////////////////////////////////////////////////////
    // Remote VTEPs
    /////////////////////////////////////////////////////////////////////////

    /// Program the flood entry for one of our VTEPs, if needed
    pub fn vtep_install(
        &self,
        vtep: &RemoteVtep,
        flooding: FloodMode,
        dplane: &mut dyn Dataplane,
    ) -> Result<(), DataplaneError> {
        vtep_install(self.vni, vtep, flooding, dplane)
    }

    pub fn vtep_uninstall(
        &self,
        address: IpAddr,
        dplane: &mut dyn Dataplane,
    ) -> Result<(), DataplaneError> {
        if self.vxlan_if.is_none() {
            debug!("VNI {}: VTEP {address} can't be uninstalled: no interface", self.vni);
            return Err(DataplaneError::NoInterface(self.vni));
        }
        vtep_uninstall(self.vni, address, dplane)
    }

    /// Remove all remote VTEPs, uninstalling them first if asked to
    pub fn vtep_del_all(&mut self, uninstall: bool, dplane: &mut dyn Dataplane) {
        for address in self.vteps.addresses() {
            if uninstall {
                let result = vtep_uninstall(self.vni, address, dplane);
                dplane_log(self.vni, "uninstall VTEP", result);
            }
            self.vteps.remove(&address);
        }
    }

    /// Install or uninstall the flood entries of all VTEPs for the given flooding mode
    /// Install the flood entries of all the VTEPs that use head-end replication
    pub fn vtep_install_all(&self, flooding: FloodMode, dplane: &mut dyn Dataplane) {
        for vtep in self.vteps.iter() {
            let result = self.vtep_install(vtep, flooding, dplane);
            dplane_log(self.vni, "install VTEP", result);
        }
    }

    pub fn vtep_reconcile(&self, flooding: FloodMode, dplane: &mut dyn Dataplane) {
        for vtep in self.vteps.iter() {
            let result = if flooding == FloodMode::HeadEnd {
                self.vtep_install(vtep, flooding, dplane)
            } else {
                self.vtep_uninstall(vtep.address, dplane)
            };
            dplane_log(self.vni, "reconcile VTEP flood entry", result);
        }
    }

    /// Record that a neighbor refers to a MAC
    pub(crate) fn bind_neigh(&mut self, mac: MacAddress, ip: IpAddr) {
        if let Some(entry) = self.macs.lookup_mut(&mac) {
            entry.neighbors.insert(ip);
        }
    }

    /// Drop the reference of a neighbor to a MAC. Gateway and placeholder MACs go
    /// away with their last neighbor.
    pub(crate) fn unbind_neigh(&mut self, mac: MacAddress, ip: IpAddr) {
        let Some(entry) = self.macs.lookup_mut(&mac) else {
            return;
        };
        entry.neighbors.remove(&ip);
        if entry.neighbors.is_empty() && (entry.def_gw || entry.origin == MacOrigin::Auto) {
            debug!("VNI {}: MAC {mac} has no neighbors left, removing", self.vni);
            self.macs.remove(&mac);
        }
    }

    /////////////////////////////////////////////////////////////////////////
    // Remote MACs and neighbors in the dataplane
    /////////////////////////////////////////////////////////////////////////

    pub(crate) fn rem_mac_install(&self, mac: &MacEntry, dplane: &mut dyn Dataplane) -> bool {
        let Some(vtep) = mac.remote_vtep() else {
            return true;
        };
        if mac.frozen {
            debug!("VNI {}: MAC {} is frozen, not installing", self.vni, mac.mac);
            return true;
        }
        let result = dplane.install_remote_mac(self.vni, mac.mac, vtep, mac.sticky);
        dplane_log(self.vni, "install remote MAC", result)
    }

    pub(crate) fn rem_mac_uninstall(&self, mac: &MacEntry, dplane: &mut dyn Dataplane) -> bool {
        let Some(vtep) = mac.remote_vtep() else {
            return true;
        };
        let result = dplane.uninstall_remote_mac(self.vni, mac.mac, vtep);
        dplane_log(self.vni, "uninstall remote MAC", result)
    }

    pub(crate) fn rem_neigh_install(&self, n: &NeighEntry, dplane: &mut dyn Dataplane) -> bool {
        if !n.is_remote() {
            return true;
        }
        let result = dplane.install_remote_neigh(self.vni, n.ip, n.mac);
        dplane_log(self.vni, "install remote neighbor", result)
    }

    pub(crate) fn rem_neigh_uninstall(&self, n: &NeighEntry, dplane: &mut dyn Dataplane) -> bool {
        if !n.is_remote() {
            return true;
        }
        let result = dplane.uninstall_remote_neigh(self.vni, n.ip);
        dplane_log(self.vni, "uninstall remote neighbor", result)
    }

    /// Re-install all remote MACs, e.g. after the access vlan changed
    pub fn rem_mac_install_all(&self, dplane: &mut dyn Dataplane) {
        for mac in self.macs.values().filter(|m| m.is_remote()) {
            self.rem_mac_install(mac, dplane);
        }
    }

    /// Delete neighbors (all, or only remote ones), uninstalling remote ones
    pub fn neigh_del_all(&mut self, remote_only: bool, dplane: &mut dyn Dataplane) {
        let ips = self.neighs.keys_where(|n| !remote_only || n.is_remote());
        for ip in ips {
            if let Some(n) = self.neighs.remove(&ip) {
                self.rem_neigh_uninstall(&n, dplane);
                if let Some(mac) = self.macs.lookup_mut(&n.mac) {
                    mac.neighbors.remove(&ip);
                }
            }
        }
    }

    /// Delete MACs (all, or only remote ones), uninstalling remote ones.
    /// MACs still referred to by neighbors are kept unless all are deleted.
    pub fn mac_del_all(&mut self, remote_only: bool, dplane: &mut dyn Dataplane) {
        let macs = self
            .macs
            .keys_where(|m| !remote_only || m.is_remote() || m.origin == MacOrigin::Auto);
        for mac in macs {
            let Some(mut entry) = self.macs.remove(&mac) else {
                continue;
            };
            self.rem_mac_uninstall(&entry, dplane);
            if remote_only && !entry.neighbors.is_empty() {
                warn!(
                    "VNI {}: MAC {mac} still has {} neighbors, keeping it",
                    self.vni,
                    entry.neighbors.len()
                );
                entry.origin = MacOrigin::Auto;
                self.macs.insert(entry);
            }
        }
    }
}
