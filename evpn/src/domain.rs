// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The routing domain hosting EVPN: settings shared by all EVPN instances.
//! It is owned by the engine and handed explicitly to the operations that need it.

use crate::vtep::FloodMode;
use derive_builder::Builder;
use std::fmt::Display;

pub type VrfId = u32;

/// Global EVPN settings. N.B. we derive a builder type `EvpnDomainBuilder`
/// and provide defaults for each field.
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct EvpnDomain {
    /// VRF hosting the EVPN underlay
    #[builder(default = 0)]
    pub vrf_id: VrfId,

    /// advertise gateway MAC-IPs for all instances
    #[builder(default = false)]
    pub advertise_gw_macip: bool,

    /// advertise SVI MAC-IPs for all instances
    #[builder(default = false)]
    pub advertise_svi_macip: bool,

    /// how BUM traffic is replicated
    #[builder(default = FloodMode::HeadEnd)]
    pub flooding: FloodMode,

    /// hold duplicate addresses frozen instead of purging them
    #[builder(default = false)]
    pub dad_freeze: bool,
}

impl Default for EvpnDomain {
    fn default() -> Self {
        Self {
            vrf_id: 0,
            advertise_gw_macip: false,
            advertise_svi_macip: false,
            flooding: FloodMode::HeadEnd,
            dad_freeze: false,
        }
    }
}

impl EvpnDomain {
    #[must_use]
    pub fn is_flooding_head_end(&self) -> bool {
        self.flooding == FloodMode::HeadEnd
    }
}

impl Display for EvpnDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        writeln!(f, "EVPN domain")?;
        writeln!(f, "  vrf                : {}", self.vrf_id)?;
        writeln!(f, "  advertise-gw-macip : {}", yes_no(self.advertise_gw_macip))?;
        writeln!(f, "  advertise-svi-macip: {}", yes_no(self.advertise_svi_macip))?;
        writeln!(f, "  flooding           : {}", self.flooding)?;
        writeln!(f, "  dup-addr freeze    : {}", yes_no(self.dad_freeze))
    }
}
