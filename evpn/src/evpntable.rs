// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Table of EVPN instances. Every instance is uniquely identified by its Vni.

use crate::dplane::Dataplane;
use crate::errors::EvpnError;
use crate::evpn::Evpn;
use crate::vni::Vni;
use std::collections::{HashMap, hash_map};

#[allow(unused)]
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
pub struct EvpnTable(HashMap<Vni, Evpn>);

#[allow(clippy::len_without_is_empty)]
impl EvpnTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    //////////////////////////////////////////////////////////////////
    /// Create an [`Evpn`] instance for the given [`Vni`], with empty tables.
    //////////////////////////////////////////////////////////////////
    pub fn create(&mut self, vni: Vni) -> Result<&mut Evpn, EvpnError> {
        match self.0.entry(vni) {
            hash_map::Entry::Occupied(_) => {
                error!("Failed to create EVPN instance for VNI {vni}: it already exists");
                Err(EvpnError::InstanceExists(vni))
            }
            hash_map::Entry::Vacant(slot) => {
                debug!("Created EVPN instance for VNI {vni}");
                Ok(slot.insert(Evpn::new(vni)))
            }
        }
    }

    //////////////////////////////////////////////////////////////////
    /// Delete the [`Evpn`] instance for a [`Vni`]. Its neighbors, MACs and
    /// VTEPs are purged (and uninstalled if remote) in that order.
    //////////////////////////////////////////////////////////////////
    pub fn delete(&mut self, vni: Vni, dplane: &mut dyn Dataplane) -> Result<(), EvpnError> {
        let Some(mut evpn) = self.0.remove(&vni) else {
            error!("Failed to delete EVPN instance for VNI {vni}: not found");
            return Err(EvpnError::NoSuchInstance(vni));
        };
        evpn.neigh_del_all(false, dplane);
        evpn.mac_del_all(false, dplane);
        evpn.vtep_del_all(true, dplane);
        evpn.es_evis.clear();
        debug!("Deleted EVPN instance for VNI {vni}");
        Ok(())
    }

    pub fn lookup(&self, vni: Vni) -> Result<&Evpn, EvpnError> {
        self.0.get(&vni).ok_or(EvpnError::NoSuchInstance(vni))
    }

    pub fn lookup_mut(&mut self, vni: Vni) -> Result<&mut Evpn, EvpnError> {
        self.0.get_mut(&vni).ok_or(EvpnError::NoSuchInstance(vni))
    }

    #[must_use]
    pub fn contains(&self, vni: Vni) -> bool {
        self.0.contains_key(&vni)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evpn> {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Evpn> {
        self.0.values_mut()
    }

    /// The Vnis of all instances, so that callers can mutate the table while walking it
    #[must_use]
    pub fn vnis(&self) -> Vec<Vni> {
        self.0.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Delete all instances
    pub fn cleanup_all(&mut self, dplane: &mut dyn Dataplane) {
        for vni in self.vnis() {
            let _ = self.delete(vni, dplane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::VxlanIf;
    use crate::mac::MacOrigin;
    use crate::mac::tests::mk_mac;
    use crate::neigh::NeighOrigin;
    use crate::testing::{DplaneOp, FakeDataplane};
    use crate::vtep::FloodMode;
    use std::net::IpAddr;

    #[test]
    fn evpn_table_create_lookup_bolero() {
        bolero::check!()
            .with_type::<u32>()
            .for_each(|value: &u32| {
                let Ok(vni) = Vni::new_checked(*value) else {
                    return;
                };
                let mut table = EvpnTable::new();
                table.create(vni).expect("Should create");
                let evpn = table.lookup(vni).expect("Should be there");
                assert!(evpn.vteps.is_empty());
                assert!(evpn.macs.is_empty());
                assert!(evpn.neighs.is_empty());
                assert!(!evpn.is_ready_for_peer());
                assert_eq!(table.create(vni).err(), Some(EvpnError::InstanceExists(vni)));
            });
    }

    #[test]
    fn evpn_table_delete_purges_everything() {
        bolero::check!()
            .with_type::<(u8, u8, u8)>()
            .for_each(|(n_vteps, n_macs, n_neighs): &(u8, u8, u8)| {
                let vni = Vni::new_checked(100).unwrap();
                let mut table = EvpnTable::new();
                let mut dplane = FakeDataplane::new();
                let evpn = table.create(vni).unwrap();
                evpn.vxlan_if = Some(VxlanIf::new("vxlan100", 10).with_bridge(5));

                let n_vteps = *n_vteps % 16;
                for n in 0..n_vteps {
                    let vtep = IpAddr::from([10, 0, 0, n + 2]);
                    evpn.vteps.add(vtep, FloodMode::HeadEnd);
                }
                for n in 0..*n_macs % 16 {
                    let vtep = IpAddr::from([10, 0, 0, 2]);
                    evpn.macs.insert_or_update(mk_mac(n), MacOrigin::Remote { vtep });
                }
                for n in 0..*n_neighs % 16 {
                    let ip = IpAddr::from([10, 1, 1, n]);
                    evpn.neighs.insert_or_update(ip, mk_mac(n), NeighOrigin::Local);
                }

                table.delete(vni, &mut dplane).unwrap();
                assert!(table.lookup(vni).is_err());
                assert!(table.is_empty());
                assert_eq!(
                    dplane.count(|op| matches!(op, DplaneOp::UninstallFlood(..))),
                    usize::from(n_vteps)
                );
            });
    }

    #[test]
    fn evpn_table_delete_unknown() {
        let vni = Vni::new_checked(100).unwrap();
        let mut table = EvpnTable::new();
        let mut dplane = FakeDataplane::new();
        assert_eq!(
            table.delete(vni, &mut dplane),
            Err(EvpnError::NoSuchInstance(vni))
        );
        assert!(dplane.ops.is_empty());
    }

    #[test]
    fn evpn_table_cleanup_all() {
        let mut table = EvpnTable::new();
        let mut dplane = FakeDataplane::new();
        for vni in 1..=10 {
            let evpn = table.create(Vni::new_checked(vni).unwrap()).unwrap();
            evpn.vteps.add(IpAddr::from([10, 0, 0, 2]), FloodMode::Disabled);
        }
        let mut vnis = table.vnis();
        vnis.sort();
        assert_eq!(vnis.len(), 10);
        assert_eq!(table.iter().count(), 10);

        table.cleanup_all(&mut dplane);
        assert!(table.is_empty());
        assert_eq!(dplane.ops.len(), 10);
    }
}
