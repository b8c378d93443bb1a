//! In-memory repository implementation.
//!
//! Used when BOM data is already loaded by the caller, and by tests. Links are
//! recorded instead of created on disk.

use super::{BomRepository, PartRepository, ReleaseRepository, SourceError, SourceResult};
use crate::diagnostics::DiagnosticSink;
use crate::model::bom::{BomDocument, BomLine};
use crate::model::ipn::Ipn;
use crate::model::part::PartRecord;
use crate::model::rules::RuleDocument;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_RELEASE_ROOT: &str = "release";
const DEFAULT_PACKAGE_ROOT: &str = "packages";

/// Workspace held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    design_boms: HashMap<String, Vec<BomLine>>,
    rule_documents: HashMap<String, RuleDocument>,
    released_boms: HashMap<String, Vec<BomLine>>,
    packages: HashMap<String, PathBuf>,
    parts: Vec<PartRecord>,
    links: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_design_bom(mut self, board: &Ipn, lines: Vec<BomLine>) -> Self {
        self.design_boms.insert(board.to_string(), lines);
        self
    }

    pub fn with_rule_document(mut self, board: &Ipn, document: RuleDocument) -> Self {
        self.rule_documents.insert(board.to_string(), document);
        self
    }

    /// Registers a released sub-assembly BOM; also registers its package.
    pub fn with_released_bom(mut self, ipn: &Ipn, lines: Vec<BomLine>) -> Self {
        self.released_boms.insert(ipn.to_string(), lines);
        self.with_package(ipn)
    }

    /// Registers a release package for an owned part.
    pub fn with_package(mut self, ipn: &Ipn) -> Self {
        self.packages.insert(
            ipn.to_string(),
            Path::new(DEFAULT_PACKAGE_ROOT).join(ipn.as_str()),
        );
        self
    }

    pub fn with_parts(mut self, parts: Vec<PartRecord>) -> Self {
        self.parts = parts;
        self
    }

    /// Links requested so far as `(existing_dir, link_path)`.
    pub fn links(&self) -> Vec<(PathBuf, PathBuf)> {
        self.links.borrow().clone()
    }
}

impl BomRepository for MemoryWorkspace {
    fn load_design_bom(&self, board: &Ipn) -> SourceResult<BomDocument> {
        self.design_boms
            .get(board.as_str())
            .map(|lines| BomDocument::from_lines(lines.clone()))
            .ok_or_else(|| SourceError::NotFound(format!("{}.csv", board.base())))
    }

    fn load_rule_document(&self, board: &Ipn) -> SourceResult<Option<RuleDocument>> {
        Ok(self.rule_documents.get(board.as_str()).cloned())
    }

    fn load_bom_rows(&self, ipn: &Ipn) -> SourceResult<Vec<BomLine>> {
        self.released_boms
            .get(ipn.as_str())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("{ipn}.csv")))
    }
}

impl PartRepository for MemoryWorkspace {
    fn load_part_records(&self, _sink: &mut dyn DiagnosticSink) -> SourceResult<Vec<PartRecord>> {
        Ok(self.parts.clone())
    }
}

impl ReleaseRepository for MemoryWorkspace {
    fn release_dir(&self, board: &Ipn) -> SourceResult<PathBuf> {
        Ok(Path::new(DEFAULT_RELEASE_ROOT).join(board.as_str()))
    }

    fn find_release_package_dir(&self, ipn: &Ipn) -> SourceResult<PathBuf> {
        self.packages
            .get(ipn.as_str())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(ipn.to_string()))
    }

    fn link_package(&self, existing_dir: &Path, link_path: &Path) -> SourceResult<()> {
        let mut links = self.links.borrow_mut();
        links.retain(|(_, link)| link != link_path);
        links.push((existing_dir.to_path_buf(), link_path.to_path_buf()));
        Ok(())
    }
}
