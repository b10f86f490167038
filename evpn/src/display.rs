// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of the EVPN state

use crate::dplane::Dataplane;
use crate::engine::{EvpnEngine, EvpnStats};
use crate::esi::EsDirectory;
use crate::evpn::Evpn;
use crate::evpntable::EvpnTable;
use crate::mac::{MacEntry, MacOrigin};
use crate::neigh::{NeighEntry, NeighOrigin};
use crate::peer::{PeerStats, PeerTransport};
use crate::vtep::RemoteVtep;
use std::fmt::Display;

const LINE_WIDTH: usize = 81;

struct Heading(String);
impl Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = (LINE_WIDTH - (self.0.len() + 2)) / 2;
        write!(f, " {0:─<width$}", "─", width = len)?;
        write!(f, " {} ", self.0)?;
        writeln!(f, " {0:─<width$}", "─", width = len)
    }
}
fn line(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, " {0:─<width$}", "─", width = LINE_WIDTH)
}

impl Display for RemoteVtep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<40} flood: {}", self.address, self.flood)
    }
}

impl Display for MacOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacOrigin::Local { ifindex: Some(ifindex) } => write!(f, "local ({ifindex})"),
            MacOrigin::Local { ifindex: None } => write!(f, "local (peer)"),
            MacOrigin::Remote { vtep } => write!(f, "remote ({vtep})"),
            MacOrigin::Auto => write!(f, "auto"),
        }
    }
}

impl Display for MacEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "  {} {:<24} seq {}/{}",
            self.mac,
            self.origin.to_string(),
            self.loc_seq,
            self.rem_seq
        )?;
        if let Some(es) = &self.es {
            write!(f, " es {es}")?;
        }
        let flags = [
            (self.sticky, "sticky"),
            (self.def_gw, "def-gw"),
            (self.remote_gw, "remote-gw"),
            (self.svi, "svi"),
            (self.duplicate, "duplicate"),
            (self.frozen, "frozen"),
            (self.peer_active, "peer-active"),
            (self.peer_proxy, "peer-proxy"),
        ];
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            write!(f, " {name}")?;
        }
        writeln!(f)
    }
}

impl Display for NeighEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origin = match self.origin {
            NeighOrigin::Local => "local".to_string(),
            NeighOrigin::Remote { vtep } => format!("remote ({vtep})"),
        };
        write!(
            f,
            "  {:<40} {} {:<24} seq {}/{}",
            self.ip, self.mac, origin, self.loc_seq, self.rem_seq
        )?;
        if self.def_gw {
            write!(f, " def-gw")?;
        }
        writeln!(f)
    }
}

impl Display for Evpn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |a: Option<String>| a.unwrap_or_else(|| "-".to_string());
        Heading(format!("VNI {}", self.vni)).fmt(f)?;
        writeln!(f, " vrf           : {}", self.vrf_id)?;
        writeln!(f, " local vtep    : {}", opt(self.local_vtep.map(|a| a.to_string())))?;
        writeln!(f, " mcast group   : {}", opt(self.mcast_grp.map(|a| a.to_string())))?;
        let vxlan = self.vxlan_if.as_ref().map(|i| {
            let state = if i.is_operative() { "operative" } else { "down" };
            format!("{} ({}) vlan {} {state}", i.name, i.ifindex, i.access_vlan)
        });
        writeln!(f, " vxlan if      : {}", opt(vxlan))?;
        writeln!(f, " svi           : {}", opt(self.svi.as_ref().map(|i| i.name.clone())))?;
        writeln!(f, " vrr           : {}", opt(self.vrr.as_ref().map(|i| i.name.clone())))?;
        writeln!(f, " announced     : {}", self.is_ready_for_peer())?;
        writeln!(
            f,
            " advertise     : gw-macip {} svi-macip {} subnet {}",
            self.advertise_gw_macip, self.advertise_svi_macip, self.advertise_subnet
        )?;
        writeln!(f, " VTEPs ({}):", self.vteps.len())?;
        for vtep in self.vteps.iter() {
            writeln!(f, "  {vtep}")?;
        }
        writeln!(f, " MACs ({}):", self.macs.len())?;
        for mac in self.macs.values() {
            mac.fmt(f)?;
        }
        writeln!(f, " Neighbors ({}):", self.neighs.len())?;
        for neigh in self.neighs.values() {
            neigh.fmt(f)?;
        }
        if !self.es_evis.is_empty() {
            writeln!(f, " ES-EVIs ({}):", self.es_evis.len())?;
            for esi in &self.es_evis {
                writeln!(f, "  {esi}")?;
            }
        }
        Ok(())
    }
}

/// One-line summary of an instance, as shown in the table summary
struct EvpnSummary<'a>(&'a Evpn);
impl Display for EvpnSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let evpn = self.0;
        let vxlan = evpn.vxlan_if.as_ref().map_or("-", |i| i.name.as_str());
        writeln!(
            f,
            " {:>8} {:<16} {:>6} {:>6} {:>6} {:>6}",
            evpn.vni.as_u32(),
            vxlan,
            evpn.vteps.len(),
            evpn.macs.len(),
            evpn.neighs.len(),
            evpn.vrf_id
        )
    }
}

impl Display for EvpnTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("EVPN instances ({})", self.len())).fmt(f)?;
        writeln!(
            f,
            " {:>8} {:<16} {:>6} {:>6} {:>6} {:>6}",
            "VNI", "vxlan-if", "VTEPs", "MACs", "ARP/ND", "vrf"
        )?;
        let mut vnis = self.vnis();
        vnis.sort();
        for evpn in vnis.iter().filter_map(|vni| self.lookup(*vni).ok()) {
            EvpnSummary(evpn).fmt(f)?;
        }
        line(f)
    }
}

impl Display for EvpnStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading("Dropped updates".to_string()).fmt(f)?;
        writeln!(f, " unknown vni      : {}", self.unknown_vni)?;
        writeln!(f, " not ready        : {}", self.not_ready)?;
        writeln!(f, " inconsistent     : {}", self.inconsistent)?;
        writeln!(f, " seq conflict     : {}", self.seq_conflict)?;
        writeln!(f, " ES not ready     : {}", self.es_not_ready)?;
        writeln!(f, " ignored          : {}", self.ignored)
    }
}

impl Display for PeerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading("Peer notifications".to_string()).fmt(f)?;
        writeln!(f, " {:<12} {:>8} {:>8}", "", "add", "del")?;
        writeln!(f, " {:<12} {:>8} {:>8}", "VNI", self.vni_add, self.vni_del)?;
        writeln!(f, " {:<12} {:>8} {:>8}", "prefix", self.prefix_add, self.prefix_del)?;
        writeln!(f, " {:<12} {:>8} {:>8}", "MAC-IP", self.macip_add, self.macip_del)?;
        writeln!(f, " {:<12} {:>8} {:>8}", "ES-EVI", self.es_evi_add, self.es_evi_del)?;
        writeln!(f, " skipped: {} failures: {}", self.skipped, self.failures)
    }
}

impl<D: Dataplane, T: PeerTransport, E: EsDirectory> Display for EvpnEngine<D, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.domain.fmt(f)?;
        self.table.fmt(f)?;
        let mut vnis = self.table.vnis();
        vnis.sort();
        for evpn in vnis.iter().filter_map(|vni| self.table.lookup(*vni).ok()) {
            evpn.fmt(f)?;
        }
        self.stats.fmt(f)?;
        self.peer.stats().fmt(f)?;
        line(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::EvpnDomain;
    use crate::engine::tests::{addr, engine_with_vni100, vni100};
    use crate::interface::RoutedIf;
    use crate::mac::tests::mk_mac;
    use crate::macip::RemoteMacIp;
    use crate::vtep::FloodMode;

    #[test]
    fn display_engine_state() {
        let mut engine = engine_with_vni100(EvpnDomain::default());
        engine
            .vtep_add(vni100(), addr("10.0.0.2"), FloodMode::HeadEnd)
            .unwrap();
        let svi = RoutedIf::new("vlan100", 20, mk_mac(0xfe))
            .with_address("10.1.1.1/24".parse().unwrap());
        engine.set_svi(vni100(), Some(svi)).unwrap();
        engine
            .remote_macip_add(&RemoteMacIp::new(
                100,
                mk_mac(1),
                Some(addr("10.1.1.10")),
                addr("10.0.0.3"),
            ))
            .unwrap();

        let evpn = engine.lookup(vni100()).unwrap();
        let shown = evpn.to_string();
        assert!(shown.contains("VNI 100"));
        assert!(shown.contains("VTEPs (2)"));
        assert!(shown.contains("flood: HER"));
        assert!(shown.contains("remote (10.0.0.3)"));
        assert!(shown.contains("svi           : vlan100"));

        let summary = engine.table().to_string();
        assert!(summary.contains("EVPN instances (1)"));
        assert!(summary.contains("vxlan100"));

        let all = engine.to_string();
        assert!(all.contains("EVPN domain"));
        assert!(all.contains("Peer notifications"));
        println!("{all}");
    }
}
