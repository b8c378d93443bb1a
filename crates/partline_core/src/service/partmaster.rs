//! Partmaster index and BOM enrichment.
//!
//! # Responsibility
//! - Group partmaster records by IPN and pick one canonical record per IPN.
//! - Copy manufacturer data from the partmaster onto BOM lines.
//!
//! # Invariants
//! - The index is read-only after `build`; `resolve` returns an owned copy.
//! - Canonical selection is a stable sort with one named comparator, so equal
//!   priorities keep load order.
//! - Only description, footprint and value are backfilled from lower-ranked
//!   records. Manufacturer columns always come from the canonical record.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::bom::BomDocument;
use crate::model::part::PartRecord;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ranking function for records that share one IPN.
pub type PriorityComparator = fn(&PartRecord, &PartRecord) -> Ordering;

/// Lowest numeric priority ranks first.
pub fn lower_priority_wins(a: &PartRecord, b: &PartRecord) -> Ordering {
    a.priority.cmp(&b.priority)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartmasterError {
    PartNotFound(String),
}

impl Display for PartmasterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartNotFound(ipn) => write!(f, "part not found: `{ipn}`"),
        }
    }
}

impl Error for PartmasterError {}

/// In-memory partmaster grouped by IPN.
#[derive(Debug, Clone)]
pub struct PartmasterIndex {
    groups: HashMap<String, Vec<PartRecord>>,
    comparator: PriorityComparator,
}

impl PartmasterIndex {
    /// Builds an index ranked by `lower_priority_wins`.
    pub fn build(records: impl IntoIterator<Item = PartRecord>) -> Self {
        Self::with_comparator(records, lower_priority_wins)
    }

    pub fn with_comparator(
        records: impl IntoIterator<Item = PartRecord>,
        comparator: PriorityComparator,
    ) -> Self {
        let mut groups: HashMap<String, Vec<PartRecord>> = HashMap::new();
        for record in records {
            groups
                .entry(record.ipn.as_str().to_string())
                .or_default()
                .push(record);
        }
        Self { groups, comparator }
    }

    /// Number of distinct IPNs.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Records for `ipn` in load order.
    pub fn candidates(&self, ipn: &str) -> &[PartRecord] {
        self.groups.get(ipn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the canonical record for `ipn` with blank descriptive fields
    /// backfilled from lower-ranked records.
    ///
    /// # Errors
    /// - `PartNotFound` when no record has this IPN.
    pub fn resolve(&self, ipn: &str) -> Result<PartRecord, PartmasterError> {
        let candidates = self
            .groups
            .get(ipn)
            .filter(|group| !group.is_empty())
            .ok_or_else(|| PartmasterError::PartNotFound(ipn.to_string()))?;

        let mut ranked: Vec<&PartRecord> = candidates.iter().collect();
        ranked.sort_by(|a, b| (self.comparator)(a, b));

        let mut canonical = ranked[0].clone();
        let rest = &ranked[1..];
        backfill(&mut canonical.description, rest, |r| &r.description);
        backfill(&mut canonical.footprint, rest, |r| &r.footprint);
        backfill(&mut canonical.value, rest, |r| &r.value);

        Ok(canonical)
    }
}

fn backfill(target: &mut String, rest: &[&PartRecord], field: fn(&PartRecord) -> &String) {
    if !target.is_empty() {
        return;
    }
    if let Some(found) = rest.iter().map(|r| field(r)).find(|v| !v.is_empty()) {
        target.clone_from(found);
    }
}

/// Copies manufacturer, MPN, datasheet and checked onto every line.
///
/// Unknown IPNs are reported to `sink` and leave the line's manufacturer
/// columns blank; the remaining lines are still processed. Returns the number
/// of unresolved lines.
pub fn attach_partmaster(
    doc: &mut BomDocument,
    index: &PartmasterIndex,
    sink: &mut dyn DiagnosticSink,
) -> usize {
    let mut unresolved = 0;
    for (line_index, line) in doc.lines_mut().iter_mut().enumerate() {
        match index.resolve(&line.ipn) {
            Ok(part) => {
                line.manufacturer = part.manufacturer;
                line.mpn = part.mpn;
                line.datasheet = part.datasheet;
                line.checked = part.checked;
            }
            Err(err) => {
                unresolved += 1;
                line.clear_manufacturer_fields();
                sink.report(Diagnostic::part_not_found(
                    line_index,
                    &line.cmp_name,
                    &line.ipn,
                    &err,
                ));
            }
        }
    }

    debug!(
        "event=partmaster_attach module=partmaster status=ok lines={} unresolved={}",
        doc.len(),
        unresolved
    );
    unresolved
}
