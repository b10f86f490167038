// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Submodule to represent the remote VTEPs of an EVPN instance

use crate::dplane::{Dataplane, DataplaneError};
use crate::vni::Vni;
use ordermap::OrderMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;

#[allow(unused)]
use tracing::{debug, error, warn};

/// How broadcast/unknown/multicast traffic is replicated towards a VTEP
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloodMode {
    #[default]
    Disabled,
    /// Multicast replication (PIM-SM underlay)
    Pim,
    /// Head-end replication
    HeadEnd,
}

impl Display for FloodMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloodMode::Disabled => write!(f, "-"),
            FloodMode::Pim => write!(f, "PIM-SM"),
            FloodMode::HeadEnd => write!(f, "HER"),
        }
    }
}

/// Type that represents a remote VTEP
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteVtep {
    pub address: IpAddr,
    pub flood: FloodMode,
}

impl RemoteVtep {
    #[must_use]
    pub fn new(address: IpAddr, flood: FloodMode) -> Self {
        Self { address, flood }
    }
}

/// The remote VTEPs of an EVPN instance, unique by address.
#[derive(Debug, Default)]
pub struct VtepSet(OrderMap<IpAddr, RemoteVtep>);

#[allow(clippy::len_without_is_empty)]
impl VtepSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn find(&self, address: &IpAddr) -> Option<&RemoteVtep> {
        self.0.get(address)
    }

    /// Add a VTEP. This does not program the dataplane. Returns `None` if a
    /// VTEP with that address already exists, leaving it untouched.
    pub fn add(&mut self, address: IpAddr, flood: FloodMode) -> Option<&RemoteVtep> {
        if self.0.contains_key(&address) {
            return None;
        }
        self.0.insert(address, RemoteVtep::new(address, flood));
        self.0.get(&address)
    }

    /// Remove a VTEP. This does not uninstall it from the dataplane.
    pub fn remove(&mut self, address: &IpAddr) -> Option<RemoteVtep> {
        self.0.remove(address)
    }

    /// Iterate over the VTEPs, most recently added first
    pub fn iter(&self) -> impl Iterator<Item = &RemoteVtep> {
        self.0.values().rev()
    }

    /// The addresses of all VTEPs, so that callers may mutate the set while walking it
    #[must_use]
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.0.keys().rev().copied().collect()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = RemoteVtep> + '_ {
        self.0.drain(..).map(|(_, vtep)| vtep)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Install the flood entry for a VTEP if head-end replication is in use globally
/// and the VTEP asked for it. No-op otherwise.
pub fn vtep_install(
    vni: Vni,
    vtep: &RemoteVtep,
    flooding: FloodMode,
    dplane: &mut dyn Dataplane,
) -> Result<(), DataplaneError> {
    if flooding == FloodMode::HeadEnd && vtep.flood == FloodMode::HeadEnd {
        debug!("VNI {vni}: installing flood entry for VTEP {}", vtep.address);
        dplane.install_replication_entry(vni, vtep.address)?;
    }
    Ok(())
}

/// Uninstall the flood entry for a VTEP, whether it had been installed or not
pub fn vtep_uninstall(
    vni: Vni,
    address: IpAddr,
    dplane: &mut dyn Dataplane,
) -> Result<(), DataplaneError> {
    debug!("VNI {vni}: uninstalling flood entry for VTEP {address}");
    dplane.uninstall_replication_entry(vni, address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DplaneOp, FakeDataplane};
    use std::str::FromStr;

    fn addr(a: &str) -> IpAddr {
        IpAddr::from_str(a).expect("Bad address")
    }

    #[test]
    fn vtep_set_basic() {
        let mut set = VtepSet::new();
        assert!(set.is_empty());

        let vtep = set.add(addr("10.0.0.2"), FloodMode::HeadEnd).cloned();
        assert_eq!(
            vtep,
            Some(RemoteVtep::new(addr("10.0.0.2"), FloodMode::HeadEnd))
        );
        assert!(
            set.add(addr("10.0.0.2"), FloodMode::HeadEnd).is_none(),
            "Duplicate should be refused"
        );
        assert!(
            set.add(addr("10.0.0.2"), FloodMode::Disabled).is_none(),
            "Duplicate should be refused regardless of flood mode"
        );
        assert_eq!(set.len(), 1);

        set.add(addr("10.0.0.3"), FloodMode::Disabled);
        set.add(addr("10.0.0.4"), FloodMode::Pim);
        assert_eq!(
            set.addresses(),
            vec![addr("10.0.0.4"), addr("10.0.0.3"), addr("10.0.0.2")],
            "Most recent first"
        );

        assert!(set.remove(&addr("10.0.0.3")).is_some());
        assert!(set.find(&addr("10.0.0.3")).is_none());
        assert!(set.remove(&addr("10.0.0.3")).is_none());
        assert_eq!(set.len(), 2);

        let drained: Vec<_> = set.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn vtep_install_only_with_head_end_replication() {
        let vni = Vni::new_checked(100).unwrap();
        let mut dplane = FakeDataplane::new();
        let her = RemoteVtep::new(addr("10.0.0.2"), FloodMode::HeadEnd);
        let disabled = RemoteVtep::new(addr("10.0.0.3"), FloodMode::Disabled);

        vtep_install(vni, &her, FloodMode::Pim, &mut dplane).unwrap();
        vtep_install(vni, &disabled, FloodMode::HeadEnd, &mut dplane).unwrap();
        assert!(dplane.ops.is_empty());

        vtep_install(vni, &her, FloodMode::HeadEnd, &mut dplane).unwrap();
        assert_eq!(
            dplane.ops,
            vec![DplaneOp::InstallFlood(vni, addr("10.0.0.2"))]
        );
    }

    #[test]
    fn vtep_install_failure_is_reported() {
        let vni = Vni::new_checked(100).unwrap();
        let mut dplane = FakeDataplane::new();
        dplane.fail = true;
        let her = RemoteVtep::new(addr("10.0.0.2"), FloodMode::HeadEnd);
        assert!(vtep_install(vni, &her, FloodMode::HeadEnd, &mut dplane).is_err());
        assert!(vtep_uninstall(vni, her.address, &mut dplane).is_err());
    }
}
