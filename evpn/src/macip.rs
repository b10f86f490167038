// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC-IP advertisements exchanged with the routing peer

use crate::esi::Esi;
use bitflags::bitflags;
use mac_address::MacAddress;
use std::fmt::Display;
use std::net::IpAddr;

bitflags! {
    /// Attributes of a MAC-IP advertisement
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MacIpFlags: u8 {
        const STICKY       = 0x01;
        const GW           = 0x02;
        const ROUTER       = 0x04;
        const PROXY_ADVERT = 0x08;
        /// The advertisement reflects a binding on an ES that is local here too
        const SYNC_PATH    = 0x10;
    }
}

/// A MAC-IP binding advertised by the peer for some VNI
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteMacIp {
    pub vni: u32,
    pub mac: MacAddress,
    pub ip: Option<IpAddr>,
    pub flags: MacIpFlags,
    pub seq: u32,
    pub vtep: IpAddr,
    pub esi: Option<Esi>,
}

impl RemoteMacIp {
    /// A remote advertisement with no flags, sequence number 0 and no ES
    #[must_use]
    pub fn new(vni: u32, mac: MacAddress, ip: Option<IpAddr>, vtep: IpAddr) -> Self {
        Self {
            vni,
            mac,
            ip,
            flags: MacIpFlags::empty(),
            seq: 0,
            vtep,
            esi: None,
        }
    }
    #[must_use]
    pub fn with_flags(mut self, flags: MacIpFlags) -> Self {
        self.flags = flags;
        self
    }
    #[must_use]
    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }
    #[must_use]
    pub fn with_esi(mut self, esi: Esi) -> Self {
        self.esi = Some(esi);
        self
    }
    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.flags.contains(MacIpFlags::SYNC_PATH)
    }
    #[must_use]
    pub fn is_sticky(&self) -> bool {
        self.flags.contains(MacIpFlags::STICKY)
    }
    #[must_use]
    pub fn is_gw(&self) -> bool {
        self.flags.contains(MacIpFlags::GW)
    }
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        self.flags.contains(MacIpFlags::PROXY_ADVERT)
    }
    /// The peer may omit the VTEP (e.g. on sync routes)
    #[must_use]
    pub fn has_vtep(&self) -> bool {
        !self.vtep.is_unspecified()
    }
}

impl Display for RemoteMacIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vni {} mac {}", self.vni, self.mac)?;
        if let Some(ip) = self.ip {
            write!(f, " ip {ip}")?;
        }
        write!(f, " vtep {} seq {}", self.vtep, self.seq)?;
        if !self.flags.is_empty() {
            write!(f, " flags {:?}", self.flags)?;
        }
        if let Some(esi) = &self.esi {
            write!(f, " esi {esi}")?;
        }
        Ok(())
    }
}
