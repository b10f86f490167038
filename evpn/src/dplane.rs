// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interface to the kernel dataplane. Requests are synchronous: a call returns
//! once the request has been accepted or refused. A refused request never rolls
//! back control-plane state; tables keep reflecting intent.

use crate::interface::IfIndex;
use crate::vni::Vni;
use mac_address::MacAddress;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataplaneError {
    #[error("Request refused: {0}")]
    Refused(String),
    #[error("No vxlan interface for VNI {0}")]
    NoInterface(Vni),
}

/// A MAC learnt locally on a bridge port, as reported by the dataplane
#[derive(Clone, Debug, PartialEq)]
pub struct LocalBinding {
    pub mac: MacAddress,
    pub ifindex: IfIndex,
    pub sticky: bool,
}

/// Operations this engine requests from the dataplane
pub trait Dataplane {
    /// Add a flood (head-end replication) entry towards a remote VTEP
    fn install_replication_entry(&mut self, vni: Vni, vtep: IpAddr) -> Result<(), DataplaneError>;

    /// Remove the flood entry towards a remote VTEP
    fn uninstall_replication_entry(&mut self, vni: Vni, vtep: IpAddr)
    -> Result<(), DataplaneError>;

    /// Program a remote MAC (fdb entry) pointing to a remote VTEP
    fn install_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
        sticky: bool,
    ) -> Result<(), DataplaneError>;

    fn uninstall_remote_mac(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        vtep: IpAddr,
    ) -> Result<(), DataplaneError>;

    /// Program a remote neighbor (ARP/ND entry)
    fn install_remote_neigh(
        &mut self,
        vni: Vni,
        ip: IpAddr,
        mac: MacAddress,
    ) -> Result<(), DataplaneError>;

    fn uninstall_remote_neigh(&mut self, vni: Vni, ip: IpAddr) -> Result<(), DataplaneError>;

    /// Read the bridge fdb for a MAC learnt locally
    fn query_local_binding(&mut self, bridge: IfIndex, mac: MacAddress) -> Option<LocalBinding>;
}
