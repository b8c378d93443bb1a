//! Sub-assembly rollup.
//!
//! # Responsibility
//! - Link the release package of every owned part into the board's release dir.
//! - Expand owned sub-assemblies depth-first into one combined parts list.
//!
//! # Invariants
//! - Child quantities are multiplied along the path from the top-level line.
//! - An assembly that reaches itself on the active path is a fatal cycle;
//!   the same assembly reached through two sibling paths is not.
//! - A combined BOM is produced only when at least one line was expanded.

use super::partmaster::{attach_partmaster, PartmasterIndex};
use super::{ResolveError, ResolveResult};
use crate::diagnostics::DiagnosticSink;
use crate::model::bom::{BomDocument, BomLine, QuantityOverflow};
use crate::model::ipn::{Ipn, IpnCodec};
use crate::repo::{BomRepository, ReleaseRepository, SourceError};
use log::{debug, info};
use std::path::PathBuf;

/// Expands owned sub-assemblies against a workspace.
pub struct RollupResolver<'a, W> {
    workspace: &'a W,
    codec: &'a IpnCodec,
    index: &'a PartmasterIndex,
}

struct RollupState {
    combined: BomDocument,
    active_path: Vec<Ipn>,
    expanded: usize,
}

impl<'a, W: BomRepository + ReleaseRepository> RollupResolver<'a, W> {
    pub fn new(workspace: &'a W, codec: &'a IpnCodec, index: &'a PartmasterIndex) -> Self {
        Self {
            workspace,
            codec,
            index,
        }
    }

    /// Rolls `document` (the corrected, enriched BOM of `board`) up into a
    /// combined BOM.
    ///
    /// Returns `Ok(None)` when no line names an owned sub-assembly.
    ///
    /// # Errors
    /// - `MissingReleasePackage` when an owned part has no released package.
    /// - `MissingSubBom` when an owned assembly has no released BOM.
    /// - `CyclicAssembly` when an assembly contains itself.
    /// - `QuantityOverflow` when a scaled or summed quantity does not fit.
    /// - `Source` for link and read failures.
    pub fn rollup(
        &self,
        board: &Ipn,
        document: &BomDocument,
        sink: &mut dyn DiagnosticSink,
    ) -> ResolveResult<Option<BomDocument>> {
        let mut combined = document.clone();
        for line in combined.lines_mut() {
            line.clear_refs();
        }

        let mut state = RollupState {
            combined,
            active_path: vec![board.clone()],
            expanded: 0,
        };
        let mut release_dir: Option<PathBuf> = None;

        for line in document.iter() {
            let class = self.codec.classify_text(&line.ipn);
            if !class.is_owned() {
                continue;
            }
            let ipn = Ipn::parse(&line.ipn)?;

            let package = self
                .workspace
                .find_release_package_dir(&ipn)
                .map_err(|source| missing_release_package(&ipn, source))?;
            let link_dir = match release_dir.take() {
                Some(dir) => dir,
                None => self.workspace.release_dir(board)?,
            };
            self.workspace
                .link_package(&package, &link_dir.join(ipn.as_str()))?;
            release_dir = Some(link_dir);

            if class.has_sub_bom() {
                state.expanded += 1;
                self.expand(&ipn, line.qty, &mut state)?;
            }
        }

        if state.expanded == 0 {
            debug!(
                "event=rollup module=rollup status=skipped board={} reason=no_sub_assemblies",
                board
            );
            return Ok(None);
        }

        let mut combined = state.combined;
        attach_partmaster(&mut combined, self.index, sink);
        combined.sort_by_ipn();

        info!(
            "event=rollup module=rollup status=ok board={} expanded={} lines={}",
            board,
            state.expanded,
            combined.len()
        );
        Ok(Some(combined))
    }

    fn expand(&self, ipn: &Ipn, multiplier: u32, state: &mut RollupState) -> ResolveResult<()> {
        if state.active_path.contains(ipn) {
            let mut path = state.active_path.clone();
            path.push(ipn.clone());
            return Err(ResolveError::CyclicAssembly { path });
        }

        let rows = self
            .workspace
            .load_bom_rows(ipn)
            .map_err(|source| missing_sub_bom(ipn, source))?;
        debug!(
            "event=rollup_expand module=rollup status=ok ipn={} rows={} multiplier={} depth={}",
            ipn,
            rows.len(),
            multiplier,
            state.active_path.len()
        );

        state.active_path.push(ipn.clone());
        for row in rows {
            let row = scale(row, multiplier)?;
            if let Ok(child) = Ipn::parse(&row.ipn) {
                if self.codec.classify_ipn(&child).has_sub_bom() {
                    self.expand(&child, row.qty, state)?;
                }
            }
            state.combined.merge_by_ipn(row)?;
        }
        state.active_path.pop();
        Ok(())
    }
}

fn scale(mut row: BomLine, multiplier: u32) -> ResolveResult<BomLine> {
    row.qty = QuantityOverflow::checked_product(&row.ipn, row.qty, multiplier)?;
    Ok(row)
}

fn missing_release_package(ipn: &Ipn, source: SourceError) -> ResolveError {
    if source.is_not_found() {
        ResolveError::MissingReleasePackage {
            ipn: ipn.clone(),
            source,
        }
    } else {
        ResolveError::Source(source)
    }
}

fn missing_sub_bom(ipn: &Ipn, source: SourceError) -> ResolveError {
    if source.is_not_found() {
        ResolveError::MissingSubBom {
            ipn: ipn.clone(),
            source,
        }
    } else {
        ResolveError::Source(source)
    }
}

#[cfg(test)]
mod tests {
    use super::scale;
    use crate::model::bom::{BomLine, QuantityOverflow};
    use crate::service::ResolveError;

    #[test]
    fn scale_multiplies_quantity() {
        let row = scale(BomLine::new("RES-001-0001", 3), 4).expect("fits");
        assert_eq!(row.qty, 12);
    }

    #[test]
    fn scale_reports_overflow() {
        let err = scale(BomLine::new("RES-001-0001", u32::MAX), 2).expect_err("overflows");
        assert!(matches!(
            err,
            ResolveError::QuantityOverflow(QuantityOverflow { operand: 2, .. })
        ));
    }
}
