// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Advertisement of the gateway (SVI / VRR) MAC-IPs and of the subnets of an
//! EVPN instance to the routing peer.

use crate::domain::EvpnDomain;
use crate::dplane::Dataplane;
use crate::engine::EvpnEngine;
use crate::errors::EvpnError;
use crate::esi::EsDirectory;
use crate::evpn::Evpn;
use crate::interface::{RoutedIf, is_link_local};
use crate::mac::MacOrigin;
use crate::macip::MacIpFlags;
use crate::neigh::NeighOrigin;
use crate::peer::{PeerChannel, PeerMsg, PeerTransport};
use crate::vni::Vni;
use std::net::IpAddr;

#[allow(unused)]
use tracing::{debug, error, warn};

/// Gateway MAC-IPs are advertised if enabled globally or for the instance
#[must_use]
pub fn advertise_gw_macip_enabled(domain: &EvpnDomain, evpn: &Evpn) -> bool {
    domain.advertise_gw_macip || evpn.advertise_gw_macip
}

/// SVI MAC-IPs are advertised if enabled globally or for the instance
#[must_use]
pub fn advertise_svi_macip_enabled(domain: &EvpnDomain, evpn: &Evpn) -> bool {
    domain.advertise_svi_macip || evpn.advertise_svi_macip
}

/// Create (or refresh) the local gateway MAC and neighbor for an address of a
/// routed interface, and advertise them. Remote entries taken over are removed
/// from the dataplane.
pub fn gw_macip_add<T: PeerTransport>(
    evpn: &mut Evpn,
    peer: &mut PeerChannel<T>,
    dplane: &mut dyn Dataplane,
    ifp: &RoutedIf,
    ip: IpAddr,
) {
    let vni = evpn.vni;
    let mac = ifp.mac;
    let origin = MacOrigin::Local {
        ifindex: Some(ifp.ifindex),
    };
    let is_svi = evpn.svi.as_ref().is_some_and(|svi| svi.ifindex == ifp.ifindex);

    let entry = evpn.macs.insert_or_update(mac, origin);
    let old = entry.clone();
    if !entry.is_local() {
        debug!("VNI {vni}: MAC {mac} of {} now local", ifp.name);
        entry.origin = origin;
        entry.rem_seq = 0;
        entry.remote_gw = false;
    }
    entry.def_gw = true;
    entry.svi |= is_svi;
    entry.neighbors.insert(ip);
    if old.is_remote() {
        evpn.rem_mac_uninstall(&old, dplane);
    }

    let neigh = evpn.neighs.insert_or_update(ip, mac, NeighOrigin::Local);
    let old = neigh.clone();
    neigh.mac = mac;
    neigh.origin = NeighOrigin::Local;
    neigh.active = true;
    neigh.def_gw = true;
    neigh.rem_seq = 0;
    let seq = neigh.loc_seq;
    if old.is_remote() {
        debug!("VNI {vni}: remote neighbor {ip} is now the gateway of {}", ifp.name);
        evpn.rem_neigh_uninstall(&old, dplane);
    }
    if old.mac != mac {
        evpn.unbind_neigh(old.mac, ip);
    }

    let mut flags = MacIpFlags::GW;
    if ip.is_ipv6() {
        flags |= MacIpFlags::ROUTER;
    }
    debug!("VNI {vni}: advertising GW MAC {mac} IP {ip} of {}", ifp.name);
    let _ = peer.send(PeerMsg::MacIpAdd {
        vni,
        mac,
        ip: Some(ip),
        flags,
        seq,
        esi: None,
    });
}

/// Remove a gateway neighbor and withdraw it. Only local neighbors are removed.
pub fn gw_macip_del<T: PeerTransport>(
    evpn: &mut Evpn,
    peer: &mut PeerChannel<T>,
    ifp: &RoutedIf,
    ip: IpAddr,
) -> Result<(), EvpnError> {
    let vni = evpn.vni;
    let Some(neigh) = evpn.neighs.lookup(&ip) else {
        return Ok(());
    };
    let mac = neigh.mac;
    if evpn.macs.lookup(&mac).is_none() {
        debug!("VNI {vni}: MAC {mac} doesn't exist for neighbor {ip}");
        return Err(EvpnError::Inconsistent(
            vni,
            format!("no MAC {mac} for gateway neighbor {ip}"),
        ));
    }
    if !neigh.is_local() {
        return Ok(());
    }

    debug!("VNI {vni}: withdrawing GW MAC {mac} IP {ip} of {}", ifp.name);
    let _ = peer.send(PeerMsg::MacIpDel {
        vni,
        mac,
        ip: Some(ip),
    });
    evpn.neighs.remove(&ip);
    evpn.unbind_neigh(mac, ip);
    Ok(())
}

/// Advertise the MAC-IPs of all the addresses of a routed interface
pub fn add_macip_for_intf<T: PeerTransport>(
    evpn: &mut Evpn,
    peer: &mut PeerChannel<T>,
    dplane: &mut dyn Dataplane,
    ifp: &RoutedIf,
) {
    for ip in ifp.ips() {
        gw_macip_add(evpn, peer, dplane, ifp, ip);
    }
}

/// Withdraw the MAC-IPs of all the addresses of a routed interface
pub fn del_macip_for_intf<T: PeerTransport>(
    evpn: &mut Evpn,
    peer: &mut PeerChannel<T>,
    ifp: &RoutedIf,
) {
    for ip in ifp.ips() {
        if let Err(e) = gw_macip_del(evpn, peer, ifp, ip) {
            warn!("Failed to withdraw {ip} of {}: {e}", ifp.name);
        }
    }
}

/// Advertise (or withdraw) the subnets configured on an interface as prefixes
/// of the tenant vrf. Link-local addresses are skipped.
pub fn subnet_advertise<T: PeerTransport>(
    evpn: &Evpn,
    peer: &mut PeerChannel<T>,
    ifp: &RoutedIf,
    enable: bool,
) {
    let vrf_id = evpn.vrf_id;
    for address in &ifp.addresses {
        if is_link_local(&address.addr()) {
            continue;
        }
        let prefix = address.trunc();
        let msg = if enable {
            PeerMsg::PrefixAdd { vrf_id, prefix }
        } else {
            PeerMsg::PrefixDel { vrf_id, prefix }
        };
        let _ = peer.send(msg);
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Per-instance walks and advertisement settings
///////////////////////////////////////////////////////////////////////////////
impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Advertise the SVI MAC-IPs of an instance if SVI or gateway advertisement is on,
    /// and the VRR ones if gateway advertisement is on.
    pub fn gw_macip_add_for_evpn(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if !evpn.is_operative() {
            return Ok(());
        }
        let Some(svi) = evpn.svi.clone() else {
            return Ok(());
        };
        let gw = advertise_gw_macip_enabled(&self.domain, evpn);
        if gw || advertise_svi_macip_enabled(&self.domain, evpn) {
            add_macip_for_intf(evpn, &mut self.peer, &mut self.dplane, &svi);
        }
        if gw {
            if let Some(vrr) = evpn.vrr.clone() {
                add_macip_for_intf(evpn, &mut self.peer, &mut self.dplane, &vrr);
            }
        }
        Ok(())
    }

    /// Withdraw the SVI and VRR MAC-IPs of an instance, unless gateway
    /// advertisement is enabled for the instance itself
    pub fn gw_macip_del_for_evpn(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if evpn.advertise_gw_macip {
            debug!("VNI {vni}: GW MAC-IP advertisement enabled, retaining");
            return Ok(());
        }
        if !evpn.is_operative() {
            return Ok(());
        }
        let Some(svi) = evpn.svi.clone() else {
            return Ok(());
        };
        del_macip_for_intf(evpn, &mut self.peer, &svi);
        if let Some(vrr) = evpn.vrr.clone() {
            del_macip_for_intf(evpn, &mut self.peer, &vrr);
        }
        Ok(())
    }

    /// Withdraw the SVI MAC-IPs of an instance, unless SVI advertisement is
    /// enabled for the instance itself. Gateway advertisement includes the SVI
    /// MAC-IPs, so they are retained while it is on too.
    pub fn svi_macip_del_for_evpn(&mut self, vni: Vni) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if evpn.advertise_svi_macip {
            debug!("VNI {vni}: SVI MAC-IP advertisement enabled, retaining");
            return Ok(());
        }
        if advertise_gw_macip_enabled(&self.domain, evpn) {
            return Ok(());
        }
        if !evpn.is_operative() {
            return Ok(());
        }
        if let Some(svi) = evpn.svi.clone() {
            del_macip_for_intf(evpn, &mut self.peer, &svi);
        }
        Ok(())
    }

    /// Enable or disable gateway MAC-IP advertisement, for one instance or globally
    pub fn set_advertise_gw_macip(&mut self, vni: Option<Vni>, enable: bool) -> Result<(), EvpnError> {
        match vni {
            Some(vni) => {
                let evpn = self.table.lookup_mut(vni)?;
                if evpn.advertise_gw_macip == enable {
                    return Ok(());
                }
                evpn.advertise_gw_macip = enable;
                if enable {
                    self.gw_macip_add_for_evpn(vni)
                } else if !self.domain.advertise_gw_macip {
                    self.gw_macip_del_for_evpn(vni)
                } else {
                    Ok(())
                }
            }
            None => {
                if self.domain.advertise_gw_macip == enable {
                    return Ok(());
                }
                self.domain.advertise_gw_macip = enable;
                for vni in self.table.vnis() {
                    if enable {
                        self.gw_macip_add_for_evpn(vni)?;
                    } else {
                        self.gw_macip_del_for_evpn(vni)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Enable or disable SVI MAC-IP advertisement, for one instance or globally
    pub fn set_advertise_svi_macip(&mut self, vni: Option<Vni>, enable: bool) -> Result<(), EvpnError> {
        match vni {
            Some(vni) => {
                let evpn = self.table.lookup_mut(vni)?;
                if evpn.advertise_svi_macip == enable {
                    return Ok(());
                }
                evpn.advertise_svi_macip = enable;
                if enable {
                    self.gw_macip_add_for_evpn(vni)
                } else if !self.domain.advertise_svi_macip {
                    self.svi_macip_del_for_evpn(vni)
                } else {
                    Ok(())
                }
            }
            None => {
                if self.domain.advertise_svi_macip == enable {
                    return Ok(());
                }
                self.domain.advertise_svi_macip = enable;
                for vni in self.table.vnis() {
                    if enable {
                        self.gw_macip_add_for_evpn(vni)?;
                    } else {
                        self.svi_macip_del_for_evpn(vni)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Enable or disable the advertisement of the SVI subnets of an instance
    pub fn set_advertise_subnet(&mut self, vni: Vni, enable: bool) -> Result<(), EvpnError> {
        let evpn = self.table.lookup_mut(vni)?;
        if evpn.advertise_subnet == enable {
            return Ok(());
        }
        evpn.advertise_subnet = enable;
        if let Some(svi) = &evpn.svi {
            subnet_advertise(evpn, &mut self.peer, svi, enable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EvpnDomainBuilder;
    use crate::engine::tests::{addr, engine_with_vni100, vni100};
    use crate::mac::MacEntry;
    use crate::mac::tests::mk_mac;
    use crate::macip::RemoteMacIp;
    use crate::neigh::NeighEntry;
    use crate::testing::{DplaneOp, FakeDataplane, FakeTransport};
    use ipnet::IpNet;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn net(n: &str) -> IpNet {
        IpNet::from_str(n).expect("Bad prefix")
    }

    fn test_svi() -> RoutedIf {
        RoutedIf::new("vlan100", 20, mk_mac(0x10))
            .with_address(net("10.1.1.1/24"))
            .with_address(net("fe80::1/64"))
    }

    #[test]
    fn advertise_subnet_skips_link_local() {
        let mut evpn = Evpn::new(vni100());
        evpn.vrf_id = 3;
        let mut peer = PeerChannel::new(FakeTransport::new());

        subnet_advertise(&evpn, &mut peer, &test_svi(), true);
        assert_eq!(
            peer.transport().sent,
            vec![PeerMsg::PrefixAdd {
                vrf_id: 3,
                prefix: net("10.1.1.0/24")
            }]
        );

        evpn.vrf_id = 4;
        peer.transport_mut().sent.clear();
        subnet_advertise(&evpn, &mut peer, &test_svi(), false);
        assert_eq!(
            peer.transport().sent,
            vec![PeerMsg::PrefixDel {
                vrf_id: 4,
                prefix: net("10.1.1.0/24")
            }]
        );
        assert_eq!(peer.stats().prefix_add, 1);
        assert_eq!(peer.stats().prefix_del, 1);
    }

    #[test]
    fn advertise_enabled_is_global_or_local() {
        let mut evpn = Evpn::new(vni100());
        let domain = EvpnDomain::default();
        assert!(!advertise_gw_macip_enabled(&domain, &evpn));
        evpn.advertise_gw_macip = true;
        assert!(advertise_gw_macip_enabled(&domain, &evpn));

        let domain = EvpnDomainBuilder::default()
            .advertise_svi_macip(true)
            .build()
            .unwrap();
        evpn.advertise_gw_macip = false;
        assert!(advertise_svi_macip_enabled(&domain, &evpn));
        assert!(!advertise_gw_macip_enabled(&domain, &evpn));
    }

    #[test]
    fn advertise_gw_macip_add_del() {
        let mut evpn = Evpn::new(vni100());
        let mut peer = PeerChannel::new(FakeTransport::new());
        let mut dplane = FakeDataplane::new();
        let svi = test_svi();
        let ip = addr("10.1.1.1");

        gw_macip_add(&mut evpn, &mut peer, &mut dplane, &svi, ip);
        let mac = evpn.macs.lookup(&svi.mac).unwrap();
        assert!(mac.is_local() && mac.def_gw);
        assert!(!mac.svi, "Not the SVI of the instance");
        assert!(dplane.ops.is_empty());
        assert!(mac.neighbors.contains(&ip));
        let neigh = evpn.neighs.lookup(&ip).unwrap();
        assert!(neigh.is_local() && neigh.active && neigh.def_gw);
        assert_eq!(
            peer.transport().sent,
            vec![PeerMsg::MacIpAdd {
                vni: vni100(),
                mac: svi.mac,
                ip: Some(ip),
                flags: MacIpFlags::GW,
                seq: 0,
                esi: None
            }]
        );

        gw_macip_del(&mut evpn, &mut peer, &svi, ip).unwrap();
        assert!(evpn.neighs.is_empty());
        assert!(evpn.macs.is_empty(), "GW MAC with no neighbors is gone");
        assert_eq!(
            peer.transport().sent.last(),
            Some(&PeerMsg::MacIpDel {
                vni: vni100(),
                mac: svi.mac,
                ip: Some(ip)
            })
        );

        // nothing to delete
        gw_macip_del(&mut evpn, &mut peer, &svi, ip).unwrap();
        assert_eq!(peer.transport().sent.len(), 2);
    }

    #[test]
    fn advertise_gw_macip_del_keeps_remote_neighbors() {
        let mut evpn = Evpn::new(vni100());
        let mut peer = PeerChannel::new(FakeTransport::new());
        let vtep = addr("10.0.0.2");
        let ip = addr("10.1.1.1");
        evpn.macs
            .insert_or_update(mk_mac(1), MacOrigin::Remote { vtep })
            .neighbors
            .insert(ip);
        evpn.neighs.insert(NeighEntry::new(ip, mk_mac(1), NeighOrigin::Remote { vtep }));

        gw_macip_del(&mut evpn, &mut peer, &test_svi(), ip).unwrap();
        assert_eq!(evpn.neighs.len(), 1);
        assert!(peer.transport().sent.is_empty());

        evpn.macs.remove(&mk_mac(1));
        assert!(matches!(
            gw_macip_del(&mut evpn, &mut peer, &test_svi(), ip),
            Err(EvpnError::Inconsistent(..))
        ));
    }

    #[test]
    fn advertise_gw_macip_rebinds_neighbor() {
        let mut evpn = Evpn::new(vni100());
        let mut peer = PeerChannel::new(FakeTransport::new());
        let ip = addr("10.1.1.1");
        let mut auto = MacEntry::new(mk_mac(1), MacOrigin::Auto);
        auto.neighbors.insert(ip);
        evpn.macs.insert(auto);
        evpn.neighs.insert(NeighEntry::new(
            ip,
            mk_mac(1),
            NeighOrigin::Remote {
                vtep: addr("10.0.0.2"),
            },
        ));

        let mut dplane = FakeDataplane::new();
        gw_macip_add(&mut evpn, &mut peer, &mut dplane, &test_svi(), ip);
        assert!(evpn.macs.lookup(&mk_mac(1)).is_none(), "Placeholder released");
        assert_eq!(evpn.neighs.lookup(&ip).unwrap().mac, test_svi().mac);
        assert_eq!(dplane.ops, vec![DplaneOp::UninstallNeigh(vni100(), ip)]);
    }

    #[test]
    fn advertise_gw_takes_over_remote_entries() {
        let mut engine = engine_with_vni100(EvpnDomain::default());
        let svi = test_svi();
        let ip = addr("10.1.1.1");
        let vtep = addr("10.0.0.2");
        let msg = RemoteMacIp::new(100, svi.mac, Some(ip), vtep).with_seq(3);
        engine.remote_macip_add(&msg).unwrap();
        engine.dplane_mut().ops.clear();

        engine.set_svi(vni100(), Some(svi.clone())).unwrap();
        assert!(engine.dplane().ops.is_empty(), "Nothing advertised yet");
        engine.set_advertise_svi_macip(Some(vni100()), true).unwrap();

        let evpn = engine.lookup(vni100()).unwrap();
        let mac = evpn.macs.lookup(&svi.mac).unwrap();
        assert_eq!(mac.origin, MacOrigin::Local { ifindex: Some(20) });
        assert!(mac.def_gw && mac.svi);
        assert_eq!(mac.rem_seq, 0);
        let neigh = evpn.neighs.lookup(&ip).unwrap();
        assert!(neigh.is_local() && neigh.def_gw);
        assert_eq!(neigh.rem_seq, 0);
        assert_eq!(
            engine.dplane().ops,
            vec![
                DplaneOp::UninstallMac(vni100(), svi.mac, vtep),
                DplaneOp::UninstallNeigh(vni100(), ip),
            ]
        );

        // withdrawing the gateway leaves nothing behind
        engine.set_advertise_svi_macip(Some(vni100()), false).unwrap();
        let evpn = engine.lookup(vni100()).unwrap();
        assert!(evpn.neighs.is_empty());
        assert!(evpn.macs.is_empty());
        assert_eq!(engine.dplane().ops.len(), 2);
    }

    #[test]
    fn advertise_walks_follow_settings() {
        let mut engine = engine_with_vni100(EvpnDomain::default());
        let svi = test_svi();
        let vrr = RoutedIf::new("vlan100-v0", 21, mk_mac(0x11)).with_address(net("10.1.1.254/24"));
        engine.set_svi(vni100(), Some(svi.clone())).unwrap();
        engine.set_vrr(vni100(), Some(vrr.clone())).unwrap();
        assert!(engine.lookup(vni100()).unwrap().neighs.is_empty(), "Nothing enabled");

        engine.set_advertise_svi_macip(Some(vni100()), true).unwrap();
        let evpn = engine.lookup(vni100()).unwrap();
        assert_eq!(evpn.neighs.len(), 2, "SVI addresses only");
        assert!(evpn.macs.lookup(&vrr.mac).is_none());

        engine.set_advertise_gw_macip(None, true).unwrap();
        assert_eq!(engine.lookup(vni100()).unwrap().neighs.len(), 3);

        // global gw off: per-instance svi flag does not retain the gw walk
        engine.set_advertise_gw_macip(None, false).unwrap();
        assert!(engine.lookup(vni100()).unwrap().neighs.is_empty());

        engine.set_advertise_gw_macip(Some(vni100()), true).unwrap();
        engine.set_advertise_svi_macip(Some(vni100()), false).unwrap();
        assert_eq!(
            engine.lookup(vni100()).unwrap().neighs.len(),
            3,
            "Own gw flag retains everything"
        );
    }

    #[test]
    fn advertise_subnet_setting() {
        let mut engine = engine_with_vni100(EvpnDomain::default());
        engine.set_svi(vni100(), Some(test_svi())).unwrap();
        engine.peer_mut().transport_mut().sent.clear();

        engine.set_advertise_subnet(vni100(), true).unwrap();
        engine.set_advertise_subnet(vni100(), true).unwrap();
        assert_eq!(
            engine.peer().transport().sent,
            vec![PeerMsg::PrefixAdd {
                vrf_id: 0,
                prefix: net("10.1.1.0/24")
            }]
        );
        engine.set_advertise_subnet(vni100(), false).unwrap();
        assert_eq!(engine.peer().stats().prefix_del, 1);
    }
}
