// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use crate::esi::Esi;
use crate::peer::TransportError;
use crate::vni::Vni;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EvpnError {
    #[error("Invalid VNI value: {0}")]
    VniInvalid(u32),

    #[error("No EVPN instance with VNI {0}")]
    NoSuchInstance(Vni),

    #[error("An EVPN instance with VNI {0} already exists")]
    InstanceExists(Vni),

    #[error("VNI {0} has no remote VTEP {1}")]
    NoSuchVtep(Vni, IpAddr),

    #[error("VNI {0} already has remote VTEP {1}")]
    VtepExists(Vni, IpAddr),

    #[error("VNI {0} is not ready: {1}")]
    NotReady(Vni, &'static str),

    #[error("Ethernet segment {0} is unknown or not ready")]
    EsNotReady(Esi),

    #[error("Inconsistent state on VNI {0}: {1}")]
    Inconsistent(Vni, String),

    #[error("Sequence number conflict for {what}: received {received}, holding {held}")]
    SeqConflict {
        what: String,
        received: u32,
        held: u32,
    },

    #[error("Peer transport failure: {0}")]
    Transport(#[from] TransportError),
}
