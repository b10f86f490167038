// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet segment identifiers and the directory of local ethernet segments.
//! Computing ES membership is done elsewhere: this engine only needs to know
//! whether a segment exists locally and whether it may be announced to the peer.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// A 10-octet Ethernet Segment Identifier
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Esi(pub [u8; 10]);

impl Esi {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Display for Esi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (n, octet) in self.0.iter().enumerate() {
            if n > 0 {
                write!(f, ":")?;
            }
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Esi {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut esi = [0u8; 10];
        let mut count = 0;
        for (n, octet) in s.split(':').enumerate() {
            if n >= esi.len() {
                return Err(format!("Too many octets in ESI '{s}'"));
            }
            esi[n] = u8::from_str_radix(octet, 16).map_err(|e| format!("Bad ESI '{s}': {e}"))?;
            count += 1;
        }
        if count != esi.len() {
            return Err(format!("ESI '{s}' must have 10 octets"));
        }
        Ok(Esi(esi))
    }
}

/// What this engine needs to know about a local ethernet segment
#[derive(Clone, Debug, PartialEq)]
pub struct EsRecord {
    pub esi: Esi,
    pub ready_for_peer: bool,
}

/// Lookup of local ethernet segments
pub trait EsDirectory {
    fn find(&self, esi: &Esi) -> Option<&EsRecord>;
}

/// In-memory [`EsDirectory`]
#[derive(Debug, Default)]
pub struct EsTable(HashMap<Esi, EsRecord>);

impl EsTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a segment. Returns the previous record, if any.
    pub fn add_es(&mut self, esi: Esi, ready_for_peer: bool) -> Option<EsRecord> {
        self.0.insert(
            esi,
            EsRecord {
                esi,
                ready_for_peer,
            },
        )
    }

    pub fn del_es(&mut self, esi: &Esi) -> Option<EsRecord> {
        self.0.remove(esi)
    }

    /// Flag a segment as ready (or not) to be announced. Returns false if unknown.
    pub fn set_ready(&mut self, esi: &Esi, ready: bool) -> bool {
        match self.0.get_mut(esi) {
            Some(record) => {
                record.ready_for_peer = ready;
                true
            }
            None => false,
        }
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

impl EsDirectory for EsTable {
    fn find(&self, esi: &Esi) -> Option<&EsRecord> {
        self.0.get(esi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esi_parse_and_display() {
        let esi = Esi::from_str("00:11:22:33:44:55:66:77:88:99").expect("Should parse");
        assert_eq!(esi.to_string(), "00:11:22:33:44:55:66:77:88:99");
        assert!(!esi.is_zero());
        assert!(Esi::default().is_zero());
        assert!(Esi::from_str("00:11:22").is_err());
        assert!(Esi::from_str("00:11:22:33:44:55:66:77:88:99:aa").is_err());
        assert!(Esi::from_str("zz:11:22:33:44:55:66:77:88:99").is_err());
    }

    #[test]
    fn es_table_readiness() {
        let esi = Esi([1, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let mut table = EsTable::new();
        assert!(table.find(&esi).is_none());
        assert!(!table.set_ready(&esi, true));

        table.add_es(esi, false);
        assert_eq!(table.find(&esi).map(|r| r.ready_for_peer), Some(false));
        assert!(table.set_ready(&esi, true));
        assert_eq!(table.find(&esi).map(|r| r.ready_for_peer), Some(true));

        assert!(table.del_es(&esi).is_some());
        assert!(table.is_empty());
    }
}
