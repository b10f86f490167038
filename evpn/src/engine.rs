// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The EVPN engine: owns the instance table, the routing domain settings,
//! the dataplane, the channel to the routing peer and the ES directory.
//! Every operation runs to completion on `&mut self`.

use crate::domain::EvpnDomain;
use crate::dplane::Dataplane;
use crate::errors::EvpnError;
use crate::esi::{EsDirectory, Esi};
use crate::evpn::{Evpn, dplane_log};
use crate::evpntable::EvpnTable;
use crate::interface::{RoutedIf, VxlanIf};
use crate::peer::{PeerChannel, PeerTransport};
use crate::vni::Vni;
use crate::vtep::FloodMode;
use std::net::IpAddr;

#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Counters of updates that were dropped, per reason
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvpnStats {
    pub unknown_vni: u64,
    pub not_ready: u64,
    pub inconsistent: u64,
    pub seq_conflict: u64,
    pub es_not_ready: u64,
    /// updates accepted but deliberately not applied
    pub ignored: u64,
}

impl EvpnStats {
    /// Account for a dropped update
    pub(crate) fn record(&mut self, e: &EvpnError) {
        match e {
            EvpnError::NoSuchInstance(_) | EvpnError::VniInvalid(_) => self.unknown_vni += 1,
            EvpnError::NotReady(..) => self.not_ready += 1,
            EvpnError::Inconsistent(..) => self.inconsistent += 1,
            EvpnError::SeqConflict { .. } => self.seq_conflict += 1,
            EvpnError::EsNotReady(_) => self.es_not_ready += 1,
            _ => {}
        }
    }
}

pub struct EvpnEngine<D: Dataplane, T: PeerTransport, E: EsDirectory> {
    pub(crate) table: EvpnTable,
    pub(crate) domain: EvpnDomain,
    pub(crate) dplane: D,
    pub(crate) peer: PeerChannel<T>,
    pub(crate) es: E,
    pub(crate) stats: EvpnStats,
}

///////////////////////////////////////////////////////////////////////////////
/// Construction and accessors
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    #[must_use]
    pub fn new(domain: EvpnDomain, dplane: D, transport: T, es: E) -> Self {
        info!("Starting EVPN engine, flooding {}", domain.flooding);
        Self {
            table: EvpnTable::new(),
            domain,
            dplane,
            peer: PeerChannel::new(transport),
            es,
            stats: EvpnStats::default(),
        }
    }
    #[must_use]
    pub fn domain(&self) -> &EvpnDomain {
        &self.domain
    }
    #[must_use]
    pub fn table(&self) -> &EvpnTable {
        &self.table
    }
    #[must_use]
    pub fn dplane(&self) -> &D {
        &self.dplane
    }
    pub fn dplane_mut(&mut self) -> &mut D {
        &mut self.dplane
    }
    #[must_use]
    pub fn peer(&self) -> &PeerChannel<T> {
        &self.peer
    }
    pub fn peer_mut(&mut self) -> &mut PeerChannel<T> {
        &mut self.peer
    }
    #[must_use]
    pub fn es(&self) -> &E {
        &self.es
    }
    pub fn es_mut(&mut self) -> &mut E {
        &mut self.es
    }
    #[must_use]
    pub fn stats(&self) -> &EvpnStats {
        &self.stats
    }

    pub fn lookup(&self, vni: Vni) -> Result<&Evpn, EvpnError> {
        self.table.lookup(vni)
    }

    pub fn lookup_mut(&mut self, vni: Vni) -> Result<&mut Evpn, EvpnError> {
        self.table.lookup_mut(vni)
    }

    /// Look up an instance for an incoming update, counting the update as dropped if unknown
    pub(crate) fn lookup_for_update(&mut self, vni: u32, what: &str) -> Result<Vni, EvpnError> {
        let found = Vni::new_checked(vni)
            .map_err(|_| EvpnError::VniInvalid(vni))
            .and_then(|vni| self.table.lookup(vni).map(|_| vni));
        if let Err(e) = &found {
            debug!("Ignoring {what}: {e}");
            self.stats.record(e);
        }
        found
    }

    /// Like `lookup_for_update`, but also requiring the instance to be operative
    pub(crate) fn operative_for_update(&mut self, vni: u32, what: &str) -> Result<Vni, EvpnError> {
        let vni = self.lookup_for_update(vni, what)?;
        if self.table.lookup(vni)?.is_operative() {
            Ok(vni)
        } else {
            let e = EvpnError::NotReady(vni, "invalid interface state");
            warn!("Ignoring {what}: {e}");
            self.stats.record(&e);
            Err(e)
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Instance life-cycle
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Create an EVPN instance
    pub fn create_instance(&mut self, vni: u32) -> Result<&mut Evpn, EvpnError> {
        let vni = Vni::new_checked(vni).map_err(|_| EvpnError::VniInvalid(vni))?;
        self.table.create(vni)
    }

    /// Delete an EVPN instance, withdrawing it from the peer first if it had been announced
    pub fn delete_instance(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let Self {
            table, peer, es, ..
        } = self;
        let evpn = table.lookup_mut(vni)?;
        if evpn.is_ready_for_peer() {
            let _ = peer.withdraw_instance(evpn, es);
        }
        self.table.delete(vni, &mut self.dplane)
    }

    pub fn announce_instance(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let Self {
            table, peer, es, ..
        } = self;
        let evpn = table.lookup_mut(vni)?;
        Ok(peer.announce_instance(evpn, es)?)
    }

    pub fn withdraw_instance(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let Self {
            table, peer, es, ..
        } = self;
        let evpn = table.lookup_mut(vni)?;
        Ok(peer.withdraw_instance(evpn, es)?)
    }

    /// Bind the vxlan interface of an instance or update its state. An instance that
    /// becomes operative is announced and its VTEPs installed. One that stops being
    /// operative is withdrawn and loses its remote state.
    pub fn set_vxlan_if(&mut self, vni: Vni, vxlan: VxlanIf) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        let was_operative = evpn.is_operative();
        let vlan_changed = evpn
            .vxlan_if
            .as_ref()
            .is_some_and(|old| old.access_vlan != vxlan.access_vlan);
        evpn.vxlan_if = Some(vxlan);
        let operative = evpn.is_operative();

        match (was_operative, operative) {
            (false, true) => {
                debug!("VNI {vni}: instance is now operative");
                evpn.vtep_install_all(self.domain.flooding, &mut self.dplane);
                self.announce_instance(vni)?;
                self.gw_macip_add_for_evpn(vni)?;
            }
            (true, false) => {
                debug!("VNI {vni}: instance is no longer operative");
                self.withdraw_instance(vni)?;
                let evpn = self.table.lookup_mut(vni)?;
                evpn.neigh_del_all(true, &mut self.dplane);
                evpn.mac_del_all(true, &mut self.dplane);
            }
            (true, true) if vlan_changed => {
                evpn.rem_mac_install_all(&mut self.dplane);
            }
            _ => {}
        }
        Ok(())
    }

    /// Set the access vlan of the vxlan interface of an instance. Remote MACs are re-installed.
    pub fn set_access_vlan(&mut self, vni: Vni, vlan: u16) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        let Some(vxlan) = evpn.vxlan_if.as_mut() else {
            return Err(EvpnError::NotReady(vni, "no vxlan interface"));
        };
        if vxlan.access_vlan == vlan {
            return Ok(());
        }
        vxlan.access_vlan = vlan;
        debug!("VNI {vni}: access vlan changed to {vlan}");
        if evpn.is_operative() {
            evpn.rem_mac_install_all(&mut self.dplane);
        }
        Ok(())
    }

    /// Set or clear the SVI of an instance. The MAC-IPs and subnets of the previous SVI
    /// are withdrawn and those of the new one advertised, as enabled.
    pub fn set_svi(&mut self, vni: Vni, svi: Option<RoutedIf>) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        let advertise_subnet = evpn.advertise_subnet;
        if let Some(old) = evpn.svi.take() {
            crate::advertise::del_macip_for_intf(evpn, &mut self.peer, &old);
            if advertise_subnet {
                crate::advertise::subnet_advertise(evpn, &mut self.peer, &old, false);
            }
        }
        evpn.svi = svi;
        if let Some(new) = evpn.svi.clone() {
            if advertise_subnet {
                crate::advertise::subnet_advertise(evpn, &mut self.peer, &new, true);
            }
        }
        if evpn.is_ready_for_peer() {
            // svi ifindex is part of the announcement
            self.announce_instance(vni)?;
        }
        self.gw_macip_add_for_evpn(vni)
    }

    /// Set or clear the VRR interface of an instance
    pub fn set_vrr(&mut self, vni: Vni, vrr: Option<RoutedIf>) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if let Some(old) = evpn.vrr.take() {
            crate::advertise::del_macip_for_intf(evpn, &mut self.peer, &old);
        }
        evpn.vrr = vrr;
        self.gw_macip_add_for_evpn(vni)
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Remote VTEPs and flooding
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Add a remote VTEP learnt from the peer and install it
    pub fn vtep_add(&mut self, vni: Vni, address: IpAddr, flood: FloodMode) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        let Some(vtep) = evpn.vteps.add(address, flood).cloned() else {
            debug!("VNI {vni}: VTEP {address} already exists");
            return Err(EvpnError::VtepExists(vni, address));
        };
        debug!("VNI {vni}: added VTEP {address} flood {flood}");
        if evpn.is_operative() {
            let result = evpn.vtep_install(&vtep, self.domain.flooding, &mut self.dplane);
            dplane_log(vni, "install VTEP", result);
        }
        Ok(())
    }

    /// Uninstall and remove a remote VTEP
    pub fn vtep_del(&mut self, vni: Vni, address: IpAddr) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if evpn.vteps.find(&address).is_none() {
            debug!("VNI {vni}: no VTEP {address} to delete");
            return Err(EvpnError::NoSuchVtep(vni, address));
        }
        let result = evpn.vtep_uninstall(address, &mut self.dplane);
        dplane_log(vni, "uninstall VTEP", result);
        evpn.vteps.remove(&address);
        debug!("VNI {vni}: removed VTEP {address}");
        Ok(())
    }

    /// Change how BUM traffic is replicated. Flood entries of all VTEPs are reconciled.
    pub fn set_flooding(&mut self, flooding: FloodMode) {
        if self.domain.flooding == flooding {
            return;
        }
        info!("Flooding mode changed from {} to {flooding}", self.domain.flooding);
        self.domain.flooding = flooding;
        self.reconcile_all_flood_state();
    }

    /// Install the flood entries of all VTEPs if head-end replication is in use, or
    /// uninstall them otherwise
    pub fn reconcile_all_flood_state(&mut self) {
        let flooding = self.domain.flooding;
        for evpn in self.table.iter() {
            evpn.vtep_reconcile(flooding, &mut self.dplane);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Multihoming
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Associate a local ethernet segment with an instance
    pub fn es_evi_add(&mut self, vni: Vni, esi: Esi) -> Result<(), EvpnError> {
        let Self {
            table, peer, es, ..
        } = self;
        let evpn = table.lookup_mut(vni)?;
        if !evpn.es_evis.insert(esi) {
            return Ok(());
        }
        debug!("VNI {vni}: added ES-EVI {esi}");
        Ok(peer.es_evi_update(evpn, esi, es, true)?)
    }

    pub fn es_evi_del(&mut self, vni: Vni, esi: Esi) -> Result<(), EvpnError> {
        let Self {
            table, peer, es, ..
        } = self;
        let evpn = table.lookup_mut(vni)?;
        if !evpn.es_evis.remove(&esi) {
            return Ok(());
        }
        debug!("VNI {vni}: removed ES-EVI {esi}");
        Ok(peer.es_evi_update(evpn, esi, es, false)?)
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Clean-up
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// EVPN got unconfigured: reset per-instance advertisement settings and
    /// drop all state learnt from the peer. Local entries are kept.
    pub fn cfg_cleanup(&mut self) {
        for evpn in self.table.iter_mut() {
            evpn.advertise_gw_macip = false;
            evpn.advertise_svi_macip = false;
            evpn.advertise_subnet = false;
            evpn.neigh_del_all(true, &mut self.dplane);
            evpn.mac_del_all(true, &mut self.dplane);
            evpn.vtep_del_all(true, &mut self.dplane);
        }
    }

    /// Delete every instance
    pub fn cleanup_all(&mut self) {
        for vni in self.table.vnis() {
            if let Err(e) = self.delete_instance(vni) {
                error!("Failed to delete VNI {vni}: {e}");
            }
        }
    }
}
