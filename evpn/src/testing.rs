// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Recording fakes of the dataplane and of the peer transport, for tests

use crate::dplane::{Dataplane, DataplaneError, LocalBinding};
use crate::interface::IfIndex;
use crate::peer::{PeerMsg, PeerTransport, TransportError};
use crate::vni::Vni;
use mac_address::MacAddress;
use std::collections::HashMap;
use std::net::IpAddr;

/// A request received by [`FakeDataplane`]
#[derive(Clone, Debug, PartialEq)]
pub enum DplaneOp {
    InstallFlood(Vni, IpAddr),
    UninstallFlood(Vni, IpAddr),
    InstallMac(Vni, MacAddress, IpAddr),
    UninstallMac(Vni, MacAddress, IpAddr),
    InstallNeigh(Vni, IpAddr, MacAddress),
    UninstallNeigh(Vni, IpAddr),
    QueryLocal(IfIndex, MacAddress),
}

/// A dataplane that records every request. If `fail` is set, every request is refused.
/// Local bindings returned by queries are taken from `local`.
#[derive(Debug, Default)]
pub struct FakeDataplane {
    pub ops: Vec<DplaneOp>,
    pub fail: bool,
    pub local: HashMap<MacAddress, LocalBinding>,
}

impl FakeDataplane {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded requests matching a predicate
    #[must_use]
    pub fn count(&self, pred: impl Fn(&DplaneOp) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    fn record(&mut self, op: DplaneOp) -> Result<(), DataplaneError> {
        self.ops.push(op);
        if self.fail {
            Err(DataplaneError::Refused("fake failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Dataplane for FakeDataplane {
    fn install_replication_entry(&mut self, vni: Vni, vtep: IpAddr) -> Result<(), DataplaneError> {
        self.record(DplaneOp::InstallFlood(vni, vtep))
    }
    fn uninstall_replication_entry(
        &mut self,
        vni: Vni,
        vtep: IpAddr,
    ) -> Result<(), DataplaneError> {
        self.record(DplaneOp::UninstallFlood(vni, vtep))
    }
    fn install_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
        _sticky: bool,
    ) -> Result<(), DataplaneError> {
        self.record(DplaneOp::InstallMac(vni, mac, vtep))
    }
    fn uninstall_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
    ) -> Result<(), DataplaneError> {
        self.record(DplaneOp::UninstallMac(vni, mac, vtep))
    }
    fn install_remote_neigh(
        &mut self,
        vni: Vni,
        ip: IpAddr,
        mac: MacAddress,
    ) -> Result<(), DataplaneError> {
        self.record(DplaneOp::InstallNeigh(vni, ip, mac))
    }
    fn uninstall_remote_neigh(&mut self, vni: Vni, ip: IpAddr) -> Result<(), DataplaneError> {
        self.record(DplaneOp::UninstallNeigh(vni, ip))
    }
    fn query_local_binding(&mut self, bridge: IfIndex, mac: MacAddress) -> Option<LocalBinding> {
        self.ops.push(DplaneOp::QueryLocal(bridge, mac));
        self.local.get(&mac).cloned()
    }
}

/// A peer transport that records what is sent
#[derive(Debug)]
pub struct FakeTransport {
    pub sent: Vec<PeerMsg>,
    pub connected: bool,
    pub fail: bool,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
            fail: false,
        }
    }
}

impl FakeTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&PeerMsg) -> bool) -> usize {
        self.sent.iter().filter(|msg| pred(msg)).count()
    }
}

impl PeerTransport for FakeTransport {
    fn send(&mut self, msg: PeerMsg) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::SendFailed(msg.to_string()));
        }
        self.sent.push(msg);
        Ok(())
    }
    fn is_connected(&self) -> bool {
        self.connected
    }
}
