// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VXLAN network identifiers

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::num::NonZero;

/// A VXLAN Network Identifier: a non-zero 24-bit value naming one overlay
/// broadcast domain. A [`Vni`] can only be built through [`Vni::new_checked`]
/// (or `TryFrom<u32>`), so that holding one means holding a legal value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(transparent)]
pub struct Vni(NonZero<u32>);

/// Reasons why a `u32` is not a legal [`Vni`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVni {
    #[error("Zero is not a legal Vni")]
    ReservedZero,
    #[error("The value {0} is too large to be a Vni (max is {max})", max = Vni::MAX)]
    TooLarge(u32),
}

impl Vni {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 0x00_FF_FF_FF;

    /// Build a [`Vni`] from a `u32`.
    ///
    /// # Errors
    ///
    /// Fails if the value is 0 or larger than [`Vni::MAX`].
    pub fn new_checked(value: u32) -> Result<Vni, InvalidVni> {
        if value > Vni::MAX {
            return Err(InvalidVni::TooLarge(value));
        }
        NonZero::new(value).map(Vni).ok_or(InvalidVni::ReservedZero)
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl Display for Vni {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl From<Vni> for u32 {
    fn from(vni: Vni) -> u32 {
        vni.as_u32()
    }
}

impl TryFrom<u32> for Vni {
    type Error = InvalidVni;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Vni::new_checked(value)
    }
}
