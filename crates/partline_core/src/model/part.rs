//! Partmaster record model.
//!
//! # Invariants
//! - Several records may share one `ipn`; `priority` decides which is canonical.
//! - Records are immutable once loaded into a `PartmasterIndex`.

use crate::model::ipn::Ipn;
use serde::{Deserialize, Serialize};

/// One approved-part row of the partmaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    pub ipn: Ipn,
    pub description: String,
    pub footprint: String,
    pub value: String,
    pub manufacturer: String,
    pub mpn: String,
    pub datasheet: String,
    pub checked: bool,
    /// Lower number means higher precedence.
    pub priority: i32,
}

impl PartRecord {
    /// Creates a record with empty attributes and priority `0`.
    pub fn new(ipn: Ipn) -> Self {
        Self {
            ipn,
            description: String::new(),
            footprint: String::new(),
            value: String::new(),
            manufacturer: String::new(),
            mpn: String::new(),
            datasheet: String::new(),
            checked: false,
            priority: 0,
        }
    }
}
