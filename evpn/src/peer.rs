// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Notifications to the routing protocol peer (e.g. BGP). Messages are typed:
//! their encoding belongs to the transport.

use crate::domain::VrfId;
use crate::esi::{EsDirectory, Esi};
use crate::evpn::Evpn;
use crate::interface::IfIndex;
use crate::macip::MacIpFlags;
use crate::vni::Vni;
use ipnet::IpNet;
use mac_address::MacAddress;
use std::fmt::Display;
use std::net::IpAddr;
use thiserror::Error;

#[allow(unused)]
use tracing::{debug, error, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to send {0}")]
    SendFailed(String),
    #[error("Peer closed the connection")]
    PeerLeft,
}

/// A message for the routing peer
#[derive(Clone, Debug, PartialEq)]
pub enum PeerMsg {
    VniAdd {
        vni: Vni,
        local_vtep: Option<IpAddr>,
        vrf_id: VrfId,
        mcast_grp: Option<IpAddr>,
        svi_ifindex: IfIndex,
    },
    VniDel {
        vni: Vni,
    },
    PrefixAdd {
        vrf_id: VrfId,
        prefix: IpNet,
    },
    PrefixDel {
        vrf_id: VrfId,
        prefix: IpNet,
    },
    MacIpAdd {
        vni: Vni,
        mac: MacAddress,
        ip: Option<IpAddr>,
        flags: MacIpFlags,
        seq: u32,
        esi: Option<Esi>,
    },
    MacIpDel {
        vni: Vni,
        mac: MacAddress,
        ip: Option<IpAddr>,
    },
    EsEviAdd {
        esi: Esi,
        vni: Vni,
    },
    EsEviDel {
        esi: Esi,
        vni: Vni,
    },
}

impl Display for PeerMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |a: &Option<IpAddr>| a.map_or("-".to_string(), |a| a.to_string());
        match self {
            PeerMsg::VniAdd {
                vni,
                local_vtep,
                vrf_id,
                mcast_grp,
                svi_ifindex,
            } => write!(
                f,
                "VNI_ADD {vni} vtep {} vrf {vrf_id} mcast {} svi {svi_ifindex}",
                opt(local_vtep),
                opt(mcast_grp)
            ),
            PeerMsg::VniDel { vni } => write!(f, "VNI_DEL {vni}"),
            PeerMsg::PrefixAdd { vrf_id, prefix } => write!(f, "PREFIX_ADD {prefix} vrf {vrf_id}"),
            PeerMsg::PrefixDel { vrf_id, prefix } => write!(f, "PREFIX_DEL {prefix} vrf {vrf_id}"),
            PeerMsg::MacIpAdd {
                vni,
                mac,
                ip,
                flags,
                seq,
                esi,
            } => {
                write!(f, "MACIP_ADD {vni} {mac} {} seq {seq}", opt(ip))?;
                if !flags.is_empty() {
                    write!(f, " flags {flags:?}")?;
                }
                if let Some(esi) = esi {
                    write!(f, " esi {esi}")?;
                }
                Ok(())
            }
            PeerMsg::MacIpDel { vni, mac, ip } => write!(f, "MACIP_DEL {vni} {mac} {}", opt(ip)),
            PeerMsg::EsEviAdd { esi, vni } => write!(f, "ES_EVI_ADD {esi} {vni}"),
            PeerMsg::EsEviDel { esi, vni } => write!(f, "ES_EVI_DEL {esi} {vni}"),
        }
    }
}

/// Delivery of [`PeerMsg`]s to the peer
pub trait PeerTransport {
    fn send(&mut self, msg: PeerMsg) -> Result<(), TransportError>;

    /// Whether the peer is running. Messages are not sent otherwise.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Number of messages sent to the peer, per kind
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeerStats {
    pub vni_add: u64,
    pub vni_del: u64,
    pub prefix_add: u64,
    pub prefix_del: u64,
    pub macip_add: u64,
    pub macip_del: u64,
    pub es_evi_add: u64,
    pub es_evi_del: u64,
    /// messages not sent because the peer was not running
    pub skipped: u64,
    pub failures: u64,
}

impl PeerStats {
    fn count(&mut self, msg: &PeerMsg) {
        let counter = match msg {
            PeerMsg::VniAdd { .. } => &mut self.vni_add,
            PeerMsg::VniDel { .. } => &mut self.vni_del,
            PeerMsg::PrefixAdd { .. } => &mut self.prefix_add,
            PeerMsg::PrefixDel { .. } => &mut self.prefix_del,
            PeerMsg::MacIpAdd { .. } => &mut self.macip_add,
            PeerMsg::MacIpDel { .. } => &mut self.macip_del,
            PeerMsg::EsEviAdd { .. } => &mut self.es_evi_add,
            PeerMsg::EsEviDel { .. } => &mut self.es_evi_del,
        };
        *counter += 1;
    }
}

/// The channel to the routing peer
#[derive(Debug)]
pub struct PeerChannel<T: PeerTransport> {
    transport: T,
    stats: PeerStats,
}

impl<T: PeerTransport> PeerChannel<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            stats: PeerStats::default(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub fn stats(&self) -> &PeerStats {
        &self.stats
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send a message. Succeeds without sending anything if the peer is not running.
    pub fn send(&mut self, msg: PeerMsg) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            self.stats.skipped += 1;
            return Ok(());
        }
        debug!("Sending {msg}");
        self.stats.count(&msg);
        self.transport.send(msg).inspect_err(|e| {
            self.stats.failures += 1;
            error!("Failed to notify peer: {e}");
        })
    }

    /// Advertise or withdraw one ES-EVI. Nothing is sent unless both the
    /// instance and the segment are ready.
    pub fn es_evi_update(
        &mut self,
        evpn: &Evpn,
        esi: Esi,
        es: &dyn EsDirectory,
        advertise: bool,
    ) -> Result<(), TransportError> {
        if !evpn.is_ready_for_peer() || !es.find(&esi).is_some_and(|r| r.ready_for_peer) {
            return Ok(());
        }
        let vni = evpn.vni;
        if advertise {
            self.send(PeerMsg::EsEviAdd { esi, vni })
        } else {
            self.send(PeerMsg::EsEviDel { esi, vni })
        }
    }

    fn es_evi_update_all(
        &mut self,
        evpn: &Evpn,
        es: &dyn EsDirectory,
        advertise: bool,
    ) -> Result<(), TransportError> {
        for esi in &evpn.es_evis {
            self.es_evi_update(evpn, *esi, es, advertise)?;
        }
        Ok(())
    }

    /// Announce an instance to the peer. The first successful announcement makes
    /// the instance ready and replays its ES-EVIs.
    pub fn announce_instance(
        &mut self,
        evpn: &mut Evpn,
        es: &dyn EsDirectory,
    ) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            self.stats.skipped += 1;
            return Ok(());
        }
        self.send(PeerMsg::VniAdd {
            vni: evpn.vni,
            local_vtep: evpn.local_vtep,
            vrf_id: evpn.vrf_id,
            mcast_grp: evpn.mcast_grp,
            svi_ifindex: evpn.svi_ifindex(),
        })?;
        if !evpn.ready_for_peer {
            evpn.ready_for_peer = true;
            self.es_evi_update_all(evpn, es, true)?;
        }
        Ok(())
    }

    /// Withdraw an instance from the peer. Its ES-EVIs are withdrawn before the instance.
    pub fn withdraw_instance(
        &mut self,
        evpn: &mut Evpn,
        es: &dyn EsDirectory,
    ) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            self.stats.skipped += 1;
            return Ok(());
        }
        if evpn.ready_for_peer {
            let result = self.es_evi_update_all(evpn, es, false);
            evpn.ready_for_peer = false;
            result?;
        }
        self.send(PeerMsg::VniDel { vni: evpn.vni })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esi::EsTable;
    use crate::testing::FakeTransport;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn esi(n: u8) -> Esi {
        Esi([0, 0, 0, 0, 0, 0, 0, 0, 0, n])
    }

    fn test_evpn() -> Evpn {
        let mut evpn = Evpn::new(Vni::new_checked(100).unwrap());
        evpn.local_vtep = Some("10.0.0.1".parse().unwrap());
        evpn.es_evis.insert(esi(1));
        evpn.es_evis.insert(esi(2));
        evpn
    }

    #[test]
    fn peer_announce_then_withdraw_ordering() {
        let mut es = EsTable::new();
        es.add_es(esi(1), true);
        es.add_es(esi(2), false);
        let mut evpn = test_evpn();
        let vni = evpn.vni;
        let mut peer = PeerChannel::new(FakeTransport::new());

        peer.announce_instance(&mut evpn, &es).unwrap();
        assert!(evpn.is_ready_for_peer());
        peer.announce_instance(&mut evpn, &es).unwrap();
        peer.withdraw_instance(&mut evpn, &es).unwrap();
        assert!(!evpn.is_ready_for_peer());

        let vni_add = PeerMsg::VniAdd {
            vni,
            local_vtep: evpn.local_vtep,
            vrf_id: 0,
            mcast_grp: None,
            svi_ifindex: 0,
        };
        assert_eq!(
            peer.transport().sent,
            vec![
                vni_add.clone(),
                PeerMsg::EsEviAdd { esi: esi(1), vni },
                vni_add,
                PeerMsg::EsEviDel { esi: esi(1), vni },
                PeerMsg::VniDel { vni },
            ]
        );
        assert_eq!(peer.stats().vni_add, 2);
        assert_eq!(peer.stats().es_evi_del, 1);
    }

    #[test]
    fn peer_not_running() {
        let es = EsTable::new();
        let mut evpn = test_evpn();
        let mut peer = PeerChannel::new(FakeTransport::new());
        peer.transport_mut().connected = false;

        assert!(peer.announce_instance(&mut evpn, &es).is_ok());
        assert!(!evpn.is_ready_for_peer());
        assert!(peer.send(PeerMsg::VniDel { vni: evpn.vni }).is_ok());
        assert!(peer.transport().sent.is_empty());
        assert_eq!(peer.stats().skipped, 2);
    }

    #[traced_test]
    #[test]
    fn peer_send_failure() {
        let es = EsTable::new();
        let mut evpn = test_evpn();
        let mut peer = PeerChannel::new(FakeTransport::new());
        peer.transport_mut().fail = true;

        assert!(peer.announce_instance(&mut evpn, &es).is_err());
        assert!(!evpn.is_ready_for_peer());
        assert_eq!(peer.stats().failures, 1);
        assert!(logs_contain("Failed to notify peer"));
    }
}
