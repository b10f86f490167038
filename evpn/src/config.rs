// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! EVPN configuration: the settings of the routing domain and the EVPN instances
//! to create. The configuration is deserializable so that it can be loaded from a file.

use crate::domain::{EvpnDomain, EvpnDomainBuilder, VrfId};
use crate::dplane::Dataplane;
use crate::engine::EvpnEngine;
use crate::errors::EvpnError;
use crate::esi::EsDirectory;
use crate::interface::{RoutedIf, VxlanIf};
use crate::peer::PeerTransport;
use crate::vni::Vni;
use crate::vtep::FloodMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;
use thiserror::Error;

#[allow(unused)]
use tracing::{debug, error, info};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid VNI {0}")]
    InvalidVni(u32),
    #[error("VNI {0} is configured more than once")]
    DuplicateVni(Vni),
    #[error("VTEP {1} is configured more than once for VNI {0}")]
    DuplicateVtep(Vni, IpAddr),
    #[error("Invalid domain settings: {0}")]
    Domain(String),
    #[error("Failed to apply configuration: {0}")]
    Apply(#[from] EvpnError),
}

fn default_flooding() -> FloodMode {
    FloodMode::HeadEnd
}

/// A remote VTEP known by configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VtepConfig {
    pub address: IpAddr,
    #[serde(default)]
    pub flood: FloodMode,
}

/// The configuration of an EVPN instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub vni: u32,
    #[serde(default)]
    pub local_vtep: Option<IpAddr>,
    #[serde(default)]
    pub mcast_grp: Option<IpAddr>,
    #[serde(default)]
    pub vrf_id: VrfId,
    #[serde(default)]
    pub advertise_gw_macip: bool,
    #[serde(default)]
    pub advertise_svi_macip: bool,
    #[serde(default)]
    pub advertise_subnet: bool,
    #[serde(default)]
    pub vxlan_if: Option<VxlanIf>,
    #[serde(default)]
    pub svi: Option<RoutedIf>,
    #[serde(default)]
    pub vrr: Option<RoutedIf>,
    #[serde(default)]
    pub vteps: Vec<VtepConfig>,
}

/// The EVPN configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvpnConfig {
    #[serde(default)]
    pub vrf_id: VrfId,
    #[serde(default)]
    pub advertise_gw_macip: bool,
    #[serde(default)]
    pub advertise_svi_macip: bool,
    #[serde(default = "default_flooding")]
    pub flooding: FloodMode,
    #[serde(default)]
    pub dad_freeze: bool,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Default for EvpnConfig {
    fn default() -> Self {
        Self {
            vrf_id: 0,
            advertise_gw_macip: false,
            advertise_svi_macip: false,
            flooding: default_flooding(),
            dad_freeze: false,
            instances: vec![],
        }
    }
}

impl EvpnConfig {
    /// Check that VNIs are legal and unique and that no VTEP is repeated within an instance
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut vnis = BTreeSet::new();
        for instance in &self.instances {
            let vni =
                Vni::new_checked(instance.vni).map_err(|_| ConfigError::InvalidVni(instance.vni))?;
            if !vnis.insert(vni) {
                return Err(ConfigError::DuplicateVni(vni));
            }
            let mut vteps = BTreeSet::new();
            for vtep in &instance.vteps {
                if !vteps.insert(vtep.address) {
                    return Err(ConfigError::DuplicateVtep(vni, vtep.address));
                }
            }
        }
        Ok(())
    }

    /// The routing domain settings of this configuration
    pub fn domain(&self) -> Result<EvpnDomain, ConfigError> {
        EvpnDomainBuilder::default()
            .vrf_id(self.vrf_id)
            .advertise_gw_macip(self.advertise_gw_macip)
            .advertise_svi_macip(self.advertise_svi_macip)
            .flooding(self.flooding)
            .dad_freeze(self.dad_freeze)
            .build()
            .map_err(|e| ConfigError::Domain(e.to_string()))
    }
}

impl<D: Dataplane, T: PeerTransport, E: EsDirectory> EvpnEngine<D, T, E> {
    /// Apply a configuration: update the domain settings, then create (or update) the
    /// configured instances. Instances that are operative get announced.
    pub fn apply_config(&mut self, config: &EvpnConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let domain = config.domain()?;
        self.domain.vrf_id = domain.vrf_id;
        self.domain.dad_freeze = domain.dad_freeze;
        self.set_flooding(domain.flooding);
        self.set_advertise_gw_macip(None, domain.advertise_gw_macip)?;
        self.set_advertise_svi_macip(None, domain.advertise_svi_macip)?;

        for instance in &config.instances {
            self.apply_instance_config(instance)?;
        }
        info!("Applied configuration with {} instances", config.instances.len());
        Ok(())
    }

    fn apply_instance_config(&mut self, cfg: &InstanceConfig) -> Result<(), ConfigError> {
        let vni = Vni::new_checked(cfg.vni).map_err(|_| ConfigError::InvalidVni(cfg.vni))?;
        if !self.table.contains(vni) {
            self.table.create(vni)?;
        }
        let evpn = self.table.lookup_mut(vni)?;
        evpn.vrf_id = cfg.vrf_id;
        evpn.local_vtep = cfg.local_vtep;
        evpn.mcast_grp = cfg.mcast_grp;

        for vtep in &cfg.vteps {
            match self.vtep_add(vni, vtep.address, vtep.flood) {
                Ok(()) | Err(EvpnError::VtepExists(..)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.set_svi(vni, cfg.svi.clone())?;
        self.set_vrr(vni, cfg.vrr.clone())?;
        self.set_advertise_gw_macip(Some(vni), cfg.advertise_gw_macip)?;
        self.set_advertise_svi_macip(Some(vni), cfg.advertise_svi_macip)?;
        self.set_advertise_subnet(vni, cfg.advertise_subnet)?;
        if let Some(vxlan) = &cfg.vxlan_if {
            self.set_vxlan_if(vni, vxlan.clone())?;
        }
        debug!("Applied configuration of VNI {vni}");
        Ok(())
    }
}
