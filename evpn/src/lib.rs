// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A library to implement the EVPN (L2 VNI) control plane: it keeps the remote
//! VTEPs, MACs and neighbors of each EVPN instance, programs them into the
//! dataplane and notifies the routing peer of what it learns locally.

#![allow(clippy::similar_names)]

mod advertise;
pub mod config;
mod display;
pub mod domain;
pub mod dplane;
pub mod engine;
mod errors;
pub mod esi;
pub mod evpn;
pub mod evpntable;
pub mod interface;
pub mod mac;
pub mod macip;
pub mod neigh;
pub mod peer;
mod sync;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vni;
pub mod vtep;

// re-exports
pub use advertise::{advertise_gw_macip_enabled, advertise_svi_macip_enabled};
pub use config::{ConfigError, EvpnConfig, InstanceConfig, VtepConfig};
pub use domain::{EvpnDomain, EvpnDomainBuilder};
pub use dplane::{Dataplane, DataplaneError, LocalBinding};
pub use engine::{EvpnEngine, EvpnStats};
pub use errors::EvpnError;
pub use esi::{EsDirectory, EsRecord, EsTable, Esi};
pub use evpn::Evpn;
pub use interface::{IfIndex, RoutedIf, VxlanIf};
pub use macip::{MacIpFlags, RemoteMacIp};
pub use peer::{PeerChannel, PeerMsg, PeerTransport, TransportError};
pub use vni::Vni;
pub use vtep::FloodMode;
