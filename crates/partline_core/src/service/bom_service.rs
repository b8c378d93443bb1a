//! BOM resolution use-case service.
//!
//! # Responsibility
//! - Run the full pipeline for one board: load, correct, enrich, roll up.
//! - Collect per-line diagnostics alongside the resolved documents.
//!
//! # Invariants
//! - The returned document keeps reference designators; the combined
//!   document never does.
//! - Every resolution emits one `bom_resolve` start event and one ok or
//!   error event.

use super::partmaster::{attach_partmaster, PartmasterIndex};
use super::rollup::RollupResolver;
use super::rule_engine::RuleEngine;
use super::{ResolveError, ResolveResult};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::bom::BomDocument;
use crate::model::ipn::{Ipn, IpnCodec};
use crate::model::rules::RuleDocument;
use crate::repo::{BomRepository, PartRepository, ReleaseRepository};
use log::{error, info};
use std::time::Instant;

/// Result of resolving one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBom {
    pub board: Ipn,
    /// Corrected and enriched BOM with reference designators.
    pub document: BomDocument,
    /// Parts list with owned sub-assemblies expanded, when any were present.
    pub combined: Option<BomDocument>,
    /// Diagnostics reported while resolving this board.
    pub diagnostics: Vec<Diagnostic>,
}

/// Use-case service resolving boards against one workspace.
pub struct BomService<W: BomRepository + ReleaseRepository> {
    workspace: W,
    index: PartmasterIndex,
    codec: IpnCodec,
    rules: RuleEngine,
}

impl<W: BomRepository + ReleaseRepository> BomService<W> {
    /// Creates a service with the default category sets and rule engine.
    pub fn new(workspace: W, index: PartmasterIndex) -> Self {
        Self {
            workspace,
            index,
            codec: IpnCodec::default(),
            rules: RuleEngine::default(),
        }
    }

    /// Creates a service whose partmaster index is loaded from `workspace`.
    ///
    /// Unusable partmaster rows are reported to `sink`.
    pub fn from_workspace(workspace: W, sink: &mut dyn DiagnosticSink) -> ResolveResult<Self>
    where
        W: PartRepository,
    {
        let records = workspace.load_part_records(sink)?;
        let index = PartmasterIndex::build(records);
        Ok(Self::new(workspace, index))
    }

    pub fn with_codec(mut self, codec: IpnCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_rule_engine(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn index(&self) -> &PartmasterIndex {
        &self.index
    }

    pub fn codec(&self) -> &IpnCodec {
        &self.codec
    }

    /// Applies `rules` with this service's zero-quantity policy.
    pub fn apply_mod_rules(&self, document: BomDocument, rules: &RuleDocument) -> BomDocument {
        self.rules.apply(document, rules)
    }

    /// Parses `board` and resolves it.
    pub fn resolve_bom_text(
        &self,
        board: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> ResolveResult<ResolvedBom> {
        let board = Ipn::parse(board).map_err(ResolveError::from)?;
        self.resolve_bom(&board, sink)
    }

    /// Resolves `board`.
    ///
    /// # Contract
    /// - Rules (if any) are applied before the partmaster is attached.
    /// - Partmaster misses are reported to `sink` and never abort the call.
    /// - Rollup failures abort the call; no partial result is returned.
    pub fn resolve_bom(
        &self,
        board: &Ipn,
        sink: &mut dyn DiagnosticSink,
    ) -> ResolveResult<ResolvedBom> {
        let started_at = Instant::now();
        info!(
            "event=bom_resolve module=bom_service status=start board={}",
            board
        );

        let mut collected = CollectingSink {
            diagnostics: Vec::new(),
            inner: sink,
        };
        match self.run_pipeline(board, &mut collected) {
            Ok((document, combined)) => {
                info!(
                    "event=bom_resolve module=bom_service status=ok board={} lines={} combined_lines={} diagnostics={} duration_ms={}",
                    board,
                    document.len(),
                    combined.as_ref().map_or(0, BomDocument::len),
                    collected.diagnostics.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(ResolvedBom {
                    board: board.clone(),
                    document,
                    combined,
                    diagnostics: collected.diagnostics,
                })
            }
            Err(err) => {
                error!(
                    "event=bom_resolve module=bom_service status=error board={} duration_ms={} error_code={} error={}",
                    board,
                    started_at.elapsed().as_millis(),
                    err.error_code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run_pipeline(
        &self,
        board: &Ipn,
        sink: &mut dyn DiagnosticSink,
    ) -> ResolveResult<(BomDocument, Option<BomDocument>)> {
        let mut document = self.workspace.load_design_bom(board)?;
        if let Some(rules) = self.workspace.load_rule_document(board)? {
            document = self.rules.apply(document, &rules);
        }
        document.sort_by_ipn();
        attach_partmaster(&mut document, &self.index, sink);

        let combined = RollupResolver::new(&self.workspace, &self.codec, &self.index)
            .rollup(board, &document, sink)?;
        Ok((document, combined))
    }
}

struct CollectingSink<'a> {
    diagnostics: Vec<Diagnostic>,
    inner: &'a mut dyn DiagnosticSink,
}

impl DiagnosticSink for CollectingSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
        self.inner.report(diagnostic);
    }
}
