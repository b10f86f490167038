// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Processing of the MAC-IP bindings advertised by the routing peer. A binding
//! is either remote (behind a remote VTEP) or, when it refers to an ethernet
//! segment that is local here too, a sync of a binding that we co-own.

use crate::dplane::Dataplane;
use crate::engine::EvpnEngine;
use crate::errors::EvpnError;
use crate::esi::EsDirectory;
use crate::evpn::dplane_log;
use crate::mac::MacOrigin;
use crate::macip::{MacIpFlags, RemoteMacIp};
use crate::neigh::NeighOrigin;
use crate::peer::{PeerMsg, PeerTransport};
use crate::vni::Vni;
use crate::vtep::FloodMode;
use mac_address::MacAddress;
use std::net::IpAddr;

#[allow(unused)]
use tracing::{debug, error, warn};

fn seq_conflict(what: String, received: u32, held: u32) -> EvpnError {
    EvpnError::SeqConflict {
        what,
        received,
        held,
    }
}

impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Log and account for an update that is dropped
    fn drop_update(&mut self, what: &str, e: EvpnError) -> Result<(), EvpnError> {
        warn!("Ignoring {what}: {e}");
        self.stats.record(&e);
        Err(e)
    }

    fn ignore_update(&mut self, what: &str, reason: &str) -> Result<(), EvpnError> {
        debug!("Ignoring {what}: {reason}");
        self.stats.ignored += 1;
        Ok(())
    }

    /// Process a MAC-IP binding advertised by the peer
    pub fn remote_macip_add(&mut self, msg: &RemoteMacIp) -> Result<(), EvpnError> {
        let what = format!("remote MAC-IP add ({msg})");
        let vni = self.operative_for_update(msg.vni, &what)?;

        if msg.is_sync() {
            let esi = msg.esi.unwrap_or_default();
            if !self.es.find(&esi).is_some_and(|es| es.ready_for_peer) {
                let e = EvpnError::EsNotReady(esi);
                debug!("Ignoring {what}: {e}");
                self.stats.record(&e);
                return Err(e);
            }
            return self.sync_macip_add(vni, msg, &what);
        }
        self.rem_macip_add(vni, msg, &what)
    }

    /// A binding on a local ES, which a peer sharing the ES learnt or proxies
    fn sync_macip_add(&mut self, vni: Vni, msg: &RemoteMacIp, what: &str) -> Result<(), EvpnError> {
        if msg.flags.intersects(MacIpFlags::STICKY | MacIpFlags::GW) {
            return self.ignore_update(what, "sticky or gateway sync");
        }
        let evpn = self.table.lookup_mut(vni)?;

        if let Some(ip) = msg.ip {
            if let Some(n) = evpn.neighs.lookup(&ip) {
                let held = n.held_seq();
                let moving = n.is_local() && n.mac != msg.mac;
                if msg.seq < held || (msg.seq == held && moving) {
                    let e = seq_conflict(format!("neighbor {ip}"), msg.seq, held);
                    return self.drop_update(what, e);
                }
            }
        }
        if evpn
            .macs
            .lookup(&msg.mac)
            .is_some_and(|m| m.is_local() && (m.sticky || m.def_gw))
        {
            return self.ignore_update(what, "MAC is sticky or a gateway");
        }

        let proxy = msg.is_proxy();
        let entry = evpn
            .macs
            .insert_or_update(msg.mac, MacOrigin::Local { ifindex: None });
        let old = entry.clone();
        if !entry.is_local() {
            entry.origin = MacOrigin::Local { ifindex: None };
            entry.rem_seq = 0;
        }
        entry.es = msg.esi;
        if proxy {
            entry.peer_proxy = true;
        } else {
            entry.peer_active = true;
        }
        entry.loc_seq = entry.loc_seq.max(msg.seq);
        if old.is_remote() {
            debug!("VNI {vni}: remote MAC {} is now local (sync)", msg.mac);
            evpn.rem_mac_uninstall(&old, &mut self.dplane);
        }

        let Some(ip) = msg.ip else {
            return Ok(());
        };
        let neigh = evpn
            .neighs
            .insert_or_update(ip, msg.mac, NeighOrigin::Local);
        let old = neigh.clone();
        neigh.origin = NeighOrigin::Local;
        neigh.mac = msg.mac;
        neigh.es = msg.esi;
        if proxy {
            neigh.peer_proxy = true;
        } else {
            neigh.peer_active = true;
        }
        neigh.loc_seq = neigh.loc_seq.max(msg.seq);
        if old.is_remote() {
            evpn.rem_neigh_uninstall(&old, &mut self.dplane);
        }
        if old.mac != msg.mac {
            evpn.unbind_neigh(old.mac, ip);
        }
        evpn.bind_neigh(msg.mac, ip);
        debug!("VNI {vni}: synced neighbor {ip} MAC {}", msg.mac);
        Ok(())
    }

    /// A binding behind a remote VTEP
    fn rem_macip_add(&mut self, vni: Vni, msg: &RemoteMacIp, what: &str) -> Result<(), EvpnError> {
        let flooding = self.domain.flooding;
        let evpn = self.table.lookup_mut(vni)?;

        // the peer may advertise MAC-IPs before the VTEP itself
        if msg.has_vtep() {
            if let Some(vtep) = evpn.vteps.add(msg.vtep, FloodMode::Disabled).cloned() {
                debug!("VNI {vni}: auto-created VTEP {}", msg.vtep);
                let result = evpn.vtep_install(&vtep, flooding, &mut self.dplane);
                dplane_log(vni, "install VTEP", result);
            }
        }

        if let Some(mac) = evpn.macs.lookup(&msg.mac) {
            if mac.is_local() && (mac.sticky || mac.def_gw) {
                return self.ignore_update(what, "MAC is local sticky or gateway");
            }
            let held = mac.held_seq();
            if msg.seq < held {
                let e = seq_conflict(format!("MAC {}", msg.mac), msg.seq, held);
                return self.drop_update(what, e);
            }
        }
        if let Some(ip) = msg.ip {
            if let Some(n) = evpn.neighs.lookup(&ip) {
                let held = n.held_seq();
                if msg.seq < held {
                    let e = seq_conflict(format!("neighbor {ip}"), msg.seq, held);
                    return self.drop_update(what, e);
                }
            }
        }

        let origin = MacOrigin::Remote { vtep: msg.vtep };
        let entry = evpn.macs.insert_or_update(msg.mac, origin);
        if entry.is_local() {
            debug!("VNI {vni}: local MAC {} moved to VTEP {}", msg.mac, msg.vtep);
        }
        entry.origin = origin;
        entry.rem_seq = msg.seq;
        entry.sticky = msg.is_sticky();
        entry.remote_gw = msg.is_gw();
        entry.es = msg.esi.filter(|esi| !esi.is_zero());
        entry.clear_peer_sync();
        let entry = entry.clone();
        evpn.rem_mac_install(&entry, &mut self.dplane);

        let Some(ip) = msg.ip else {
            return Ok(());
        };
        let neigh = evpn.neighs.insert_or_update(
            ip,
            msg.mac,
            NeighOrigin::Remote { vtep: msg.vtep },
        );
        let old_mac = neigh.mac;
        neigh.origin = NeighOrigin::Remote { vtep: msg.vtep };
        neigh.mac = msg.mac;
        neigh.rem_seq = msg.seq;
        neigh.def_gw = msg.is_gw();
        neigh.clear_peer_sync();
        let neigh = neigh.clone();
        if old_mac != msg.mac {
            evpn.unbind_neigh(old_mac, ip);
        }
        evpn.bind_neigh(msg.mac, ip);
        evpn.rem_neigh_install(&neigh, &mut self.dplane);
        Ok(())
    }

    /// Process the withdrawal of a MAC-IP binding by the peer
    pub fn remote_macip_del(
        &mut self,
        vni: u32,
        mac: MacAddress,
        ip: Option<IpAddr>,
        vtep: IpAddr,
    ) -> Result<(), EvpnError> {
        let what = match ip {
            Some(ip) => format!("remote MAC-IP del (vni {vni} mac {mac} ip {ip} vtep {vtep})"),
            None => format!("remote MAC-IP del (vni {vni} mac {mac} vtep {vtep})"),
        };
        let vni = self.operative_for_update(vni, &what)?;
        let dad_freeze = self.domain.dad_freeze;
        let evpn = self.table.lookup_mut(vni)?;

        let Some(mac_entry) = evpn.macs.lookup(&mac).cloned() else {
            if let Some(ip) = ip.filter(|ip| evpn.neighs.lookup(ip).is_some()) {
                let e = EvpnError::Inconsistent(vni, format!("no MAC {mac} for neighbor {ip}"));
                return self.drop_update(&what, e);
            }
            return Ok(());
        };
        let neigh = ip.and_then(|ip| evpn.neighs.lookup(&ip)).cloned();
        if let (Some(ip), None) = (ip, &neigh) {
            let e = EvpnError::Inconsistent(vni, format!("no neighbor {ip} for MAC {mac}"));
            return self.drop_update(&what, e);
        }
        if neigh.as_ref().is_some_and(|n| n.mac != mac) {
            return self.ignore_update(&what, "neighbor is bound to another MAC");
        }
        if mac_entry.is_local() && mac_entry.def_gw {
            return self.ignore_update(&what, "MAC is a local gateway");
        }

        if let Some(neigh) = neigh {
            if neigh.is_remote() {
                evpn.rem_neigh_uninstall(&neigh, &mut self.dplane);
                evpn.neighs.remove(&neigh.ip);
                evpn.unbind_neigh(neigh.mac, neigh.ip);
                debug!("VNI {vni}: removed remote neighbor {}", neigh.ip);
            } else if let Some(n) = evpn.neighs.lookup_mut(&neigh.ip) {
                n.clear_peer_sync();
            }
            return Ok(());
        }

        if dad_freeze && mac_entry.duplicate && mac_entry.is_remote() {
            // keep the frozen entry; a local binding found now is used when unfreezing
            let found = evpn
                .bridge()
                .and_then(|bridge| self.dplane.query_local_binding(bridge, mac));
            match found {
                Some(binding) => {
                    debug!("VNI {vni}: frozen MAC {mac} is local on ifindex {}", binding.ifindex);
                    if let Some(entry) = evpn.macs.lookup_mut(&mac) {
                        entry.frozen_local = Some(binding);
                    }
                }
                None => debug!("VNI {vni}: frozen MAC {mac} is not local, keeping it"),
            }
            return Ok(());
        }

        match mac_entry.origin {
            MacOrigin::Local { .. } => {
                if let Some(entry) = evpn.macs.lookup_mut(&mac) {
                    entry.clear_peer_sync();
                }
            }
            MacOrigin::Remote { .. } => {
                evpn.rem_mac_uninstall(&mac_entry, &mut self.dplane);
                if mac_entry.neighbors.is_empty() {
                    evpn.macs.remove(&mac);
                    debug!("VNI {vni}: removed remote MAC {mac}");
                } else if let Some(entry) = evpn.macs.lookup_mut(&mac) {
                    debug!("VNI {vni}: remote MAC {mac} still has neighbors");
                    entry.origin = MacOrigin::Auto;
                    entry.rem_seq = 0;
                }
            }
            MacOrigin::Auto => {}
        }
        Ok(())
    }

    /// Mark a MAC as a duplicate, as reported by the duplicate address detector.
    /// The MAC is frozen if the domain is configured to do so.
    pub fn mac_dup_detected(&mut self, vni: Vni, mac: MacAddress) -> Result<(), EvpnError> {
        let freeze = self.domain.dad_freeze;
        let evpn = self.table.lookup_mut(vni)?;
        let Some(entry) = evpn.macs.lookup_mut(&mac) else {
            return Err(EvpnError::Inconsistent(vni, format!("no MAC {mac}")));
        };
        entry.duplicate = true;
        entry.frozen = freeze;
        warn!("VNI {vni}: duplicate MAC {mac} detected{}", if freeze { ", frozen" } else { "" });
        Ok(())
    }

    /// Clear the duplicate state of a MAC. A local binding found while the MAC was frozen
    /// takes over and is advertised with a sequence number above the remote one.
    pub fn clear_dup_addr(&mut self, vni: Vni, mac: MacAddress) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        let Some(entry) = evpn.macs.lookup_mut(&mac) else {
            return Err(EvpnError::Inconsistent(vni, format!("no MAC {mac}")));
        };
        if !entry.duplicate {
            return Ok(());
        }
        entry.duplicate = false;
        entry.frozen = false;
        let shadow = entry.frozen_local.take();
        let old = entry.clone();

        let Some(local) = shadow else {
            debug!("VNI {vni}: unfroze MAC {mac}");
            evpn.rem_mac_install(&old, &mut self.dplane);
            return Ok(());
        };

        debug!("VNI {vni}: unfroze MAC {mac}, now local on ifindex {}", local.ifindex);
        evpn.rem_mac_uninstall(&old, &mut self.dplane);
        let seq = old.rem_seq.max(old.loc_seq) + 1;
        if let Some(entry) = evpn.macs.lookup_mut(&mac) {
            entry.origin = MacOrigin::Local {
                ifindex: Some(local.ifindex),
            };
            entry.sticky = local.sticky;
            entry.es = None;
            entry.loc_seq = seq;
            entry.rem_seq = 0;
        }
        let flags = if local.sticky {
            MacIpFlags::STICKY
        } else {
            MacIpFlags::empty()
        };
        self.peer.send(PeerMsg::MacIpAdd {
            vni,
            mac,
            ip: None,
            flags,
            seq,
            esi: None,
        })?;
        Ok(())
    }
}
