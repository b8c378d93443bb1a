//! BOM line items and the line store primitives.
//!
//! # Responsibility
//! - Define the line-item shape shared by design-tool exports, released
//!   sub-assembly BOMs and generated purchasing BOMs.
//! - Provide the merge, sort and reference-editing primitives used by the
//!   rule engine and the rollup resolver.
//!
//! # Invariants
//! - `BomLine::ipn` keeps the raw cell text; design tools may leave it blank.
//! - Sorting is a stable, exact-string sort on `ipn`.
//! - Reference tokens are separated by commas and/or whitespace.
//! - Quantity arithmetic is checked; an overflow is an error, never a clamp.

use crate::model::fields::{deserialize_flag, deserialize_quantity, serialize_flag};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One BOM line item.
///
/// Serde names match the column headers of line-item tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BomLine {
    #[serde(rename = "IPN")]
    pub ipn: String,
    #[serde(rename = "Qty", alias = "Qnty", deserialize_with = "deserialize_quantity")]
    pub qty: u32,
    #[serde(rename = "MPN")]
    pub mpn: String,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Ref")]
    pub reference: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Cmp name")]
    pub cmp_name: String,
    #[serde(rename = "Footprint")]
    pub footprint: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Vendor")]
    pub vendor: String,
    #[serde(rename = "Datasheet")]
    pub datasheet: String,
    #[serde(
        rename = "Checked",
        deserialize_with = "deserialize_flag",
        serialize_with = "serialize_flag"
    )]
    pub checked: bool,
}

impl BomLine {
    pub fn new(ipn: impl Into<String>, qty: u32) -> Self {
        Self {
            ipn: ipn.into(),
            qty,
            ..Self::default()
        }
    }

    /// Builder-style reference setter, mostly for fixtures.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Builder-style component name setter.
    pub fn with_cmp_name(mut self, cmp_name: impl Into<String>) -> Self {
        self.cmp_name = cmp_name.into();
        self
    }

    pub fn ref_tokens(&self) -> Vec<&str> {
        split_refs(&self.reference)
    }

    /// Strips `reference` from the reference list and sets `qty` to the
    /// remaining token count.
    ///
    /// The quantity is recomputed even when the reference is absent, so a
    /// line without designators ends at zero. Returns whether the reference
    /// was present; the reference text is only rewritten in that case.
    pub fn remove_ref(&mut self, reference: &str) -> bool {
        let target = reference.trim();
        let tokens = self.ref_tokens();
        let found = !target.is_empty() && tokens.contains(&target);
        let remaining: Vec<&str> = tokens.into_iter().filter(|token| *token != target).collect();
        let qty = remaining.len() as u32;

        if found {
            let separator = if self.reference.contains(',') { ", " } else { " " };
            self.reference = remaining.join(separator);
        }
        self.qty = qty;
        found
    }

    pub fn clear_refs(&mut self) {
        self.reference.clear();
    }

    /// Clears the partmaster-sourced manufacturer columns.
    pub fn clear_manufacturer_fields(&mut self) {
        self.manufacturer.clear();
        self.mpn.clear();
        self.datasheet.clear();
        self.checked = false;
    }
}

/// Splits reference designator text into tokens.
pub fn split_refs(value: &str) -> Vec<&str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Orders designators by trailing number first, then lexicographically, so
/// `R2` sorts before `R10` and `C3` before `R10`.
pub fn compare_refs(a: &str, b: &str) -> Ordering {
    numeric_suffix(a)
        .cmp(&numeric_suffix(b))
        .then_with(|| a.cmp(b))
}

/// Deduplicates and sorts reference tokens, joined by single spaces.
pub fn normalize_refs(value: &str) -> (String, usize) {
    let mut tokens = split_refs(value);
    tokens.sort_by(|a, b| compare_refs(a, b));
    tokens.dedup();
    (tokens.join(" "), tokens.len())
}

fn numeric_suffix(token: &str) -> Option<u64> {
    let digits_start = token
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(index, _)| index)?;
    token[digits_start..].parse::<u64>().ok()
}

fn checked_sum(ipn: &str, qty: u32, added: u32) -> Result<u32, QuantityOverflow> {
    qty.checked_add(added).ok_or_else(|| QuantityOverflow {
        ipn: ipn.to_string(),
        qty,
        operand: added,
        op: QuantityOp::Add,
    })
}

/// Arithmetic that produced an out-of-range quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityOp {
    Add,
    Multiply,
}

/// A line quantity that no longer fits the quantity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityOverflow {
    pub ipn: String,
    pub qty: u32,
    pub operand: u32,
    pub op: QuantityOp,
}

impl QuantityOverflow {
    /// Checked `qty * multiplier` for `ipn`.
    pub fn checked_product(ipn: &str, qty: u32, multiplier: u32) -> Result<u32, Self> {
        qty.checked_mul(multiplier).ok_or_else(|| Self {
            ipn: ipn.to_string(),
            qty,
            operand: multiplier,
            op: QuantityOp::Multiply,
        })
    }
}

impl Display for QuantityOverflow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            QuantityOp::Add => "+",
            QuantityOp::Multiply => "x",
        };
        write!(
            f,
            "quantity overflow for {}: {} {op} {} does not fit",
            self.ipn, self.qty, self.operand
        )
    }
}

impl Error for QuantityOverflow {}

/// Ordered collection of BOM lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BomDocument {
    lines: Vec<BomLine>,
}

impl BomDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<BomLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [BomLine] {
        &mut self.lines
    }

    pub fn into_lines(self) -> Vec<BomLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BomLine> {
        self.lines.iter()
    }

    pub fn push(&mut self, line: BomLine) {
        self.lines.push(line);
    }

    pub fn retain(&mut self, keep: impl FnMut(&BomLine) -> bool) {
        self.lines.retain(keep);
    }

    /// First line with exactly this IPN text.
    pub fn find(&self, ipn: &str) -> Option<&BomLine> {
        self.lines.iter().find(|line| line.ipn == ipn)
    }

    /// Adds quantities into an existing line with the same IPN, or appends
    /// the line with its references cleared.
    ///
    /// # Errors
    /// - `QuantityOverflow` when the summed quantity does not fit; the
    ///   document is left unchanged.
    pub fn merge_by_ipn(&mut self, line: BomLine) -> Result<(), QuantityOverflow> {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.ipn == line.ipn) {
            existing.qty = checked_sum(&existing.ipn, existing.qty, line.qty)?;
            return Ok(());
        }

        let mut line = line;
        line.clear_refs();
        self.lines.push(line);
        Ok(())
    }

    /// Merges a line keyed by manufacturer part number.
    ///
    /// A zero quantity counts as one. With `keep_refs`, merged references are
    /// deduplicated, re-sorted and the quantity becomes the token count; a
    /// blank MPN never matches another line.
    ///
    /// # Errors
    /// - `QuantityOverflow` when a summed quantity does not fit.
    pub fn merge_by_mpn(
        &mut self,
        line: BomLine,
        keep_refs: bool,
    ) -> Result<(), QuantityOverflow> {
        let mut line = line;
        if line.qty == 0 {
            line.qty = 1;
        }

        let existing = if line.mpn.trim().is_empty() {
            None
        } else {
            self.lines.iter_mut().find(|l| l.mpn == line.mpn)
        };

        match existing {
            Some(existing) => {
                let (reference, count) = if keep_refs {
                    normalize_refs(&format!("{} {}", existing.reference, line.reference))
                } else {
                    (String::new(), 0)
                };
                if count > 0 {
                    existing.qty = count as u32;
                } else {
                    existing.qty = checked_sum(&existing.ipn, existing.qty, line.qty)?;
                }
                if keep_refs {
                    existing.reference = reference;
                }
            }
            None => {
                if !keep_refs {
                    line.clear_refs();
                }
                self.lines.push(line);
            }
        }
        Ok(())
    }

    /// Folds every line through `merge_by_mpn` into a new MPN-keyed list.
    pub fn consolidate_by_mpn(&self, keep_refs: bool) -> Result<BomDocument, QuantityOverflow> {
        let mut out = BomDocument::new();
        for line in &self.lines {
            out.merge_by_mpn(line.clone(), keep_refs)?;
        }
        out.sort_by_ipn();
        Ok(out)
    }

    /// Stable ascending sort by IPN text.
    pub fn sort_by_ipn(&mut self) {
        self.lines.sort_by(|a, b| a.ipn.cmp(&b.ipn));
    }

    /// Sum of all line quantities.
    pub fn total_qty(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.qty)).sum()
    }
}

impl FromIterator<BomLine> for BomDocument {
    fn from_iter<T: IntoIterator<Item = BomLine>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for BomDocument {
    type Item = BomLine;
    type IntoIter = std::vec::IntoIter<BomLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a BomDocument {
    type Item = &'a BomLine;
    type IntoIter = std::slice::Iter<'a, BomLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
