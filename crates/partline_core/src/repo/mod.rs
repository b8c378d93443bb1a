//! Repository contracts and implementations for BOM inputs and release outputs.
//!
//! # Responsibility
//! - Define the data access contracts the resolution engine consumes.
//! - Keep file discovery and table formats out of the service layer.
//!
//! # Invariants
//! - Missing inputs are reported as `SourceError::NotFound`, never as empty data.
//! - `link_package` is idempotent: an existing link at the target is replaced.

pub mod fs_repo;
pub mod memory_repo;

use crate::diagnostics::DiagnosticSink;
use crate::model::bom::{BomDocument, BomLine};
use crate::model::ipn::Ipn;
use crate::model::part::PartRecord;
use crate::model::rules::{RuleDocument, RuleDocumentError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while loading inputs or writing release artifacts.
#[derive(Debug)]
pub enum SourceError {
    /// Named file or directory does not exist in the workspace.
    NotFound(String),
    Io { path: PathBuf, source: io::Error },
    Csv { path: PathBuf, source: csv::Error },
    RuleDocument {
        path: PathBuf,
        source: RuleDocumentError,
    },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "not found: {name}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Csv { path, source } => write!(f, "{}: {source}", path.display()),
            Self::RuleDocument { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::RuleDocument { source, .. } => Some(source),
        }
    }
}

/// Access to design-tool BOMs, released sub-assembly BOMs and rule documents.
pub trait BomRepository {
    /// Raw BOM exported by the design tool for `board`.
    fn load_design_bom(&self, board: &Ipn) -> SourceResult<BomDocument>;
    /// Correction rules for `board`, if any were written.
    fn load_rule_document(&self, board: &Ipn) -> SourceResult<Option<RuleDocument>>;
    /// Released BOM rows of an owned sub-assembly.
    fn load_bom_rows(&self, ipn: &Ipn) -> SourceResult<Vec<BomLine>>;
}

/// Access to partmaster records.
pub trait PartRepository {
    /// Loads all records; unusable rows are reported to `sink` and skipped.
    fn load_part_records(&self, sink: &mut dyn DiagnosticSink) -> SourceResult<Vec<PartRecord>>;
}

/// Access to release packages and the output directory of a resolution.
pub trait ReleaseRepository {
    /// Output directory for `board`, created when missing.
    fn release_dir(&self, board: &Ipn) -> SourceResult<PathBuf>;
    /// Location of the released package of an owned part.
    fn find_release_package_dir(&self, ipn: &Ipn) -> SourceResult<PathBuf>;
    /// Creates or replaces a link at `link_path` pointing to `existing_dir`.
    fn link_package(&self, existing_dir: &Path, link_path: &Path) -> SourceResult<()>;
}

impl<T: BomRepository + ?Sized> BomRepository for &T {
    fn load_design_bom(&self, board: &Ipn) -> SourceResult<BomDocument> {
        (**self).load_design_bom(board)
    }

    fn load_rule_document(&self, board: &Ipn) -> SourceResult<Option<RuleDocument>> {
        (**self).load_rule_document(board)
    }

    fn load_bom_rows(&self, ipn: &Ipn) -> SourceResult<Vec<BomLine>> {
        (**self).load_bom_rows(ipn)
    }
}

impl<T: PartRepository + ?Sized> PartRepository for &T {
    fn load_part_records(&self, sink: &mut dyn DiagnosticSink) -> SourceResult<Vec<PartRecord>> {
        (**self).load_part_records(sink)
    }
}

impl<T: ReleaseRepository + ?Sized> ReleaseRepository for &T {
    fn release_dir(&self, board: &Ipn) -> SourceResult<PathBuf> {
        (**self).release_dir(board)
    }

    fn find_release_package_dir(&self, ipn: &Ipn) -> SourceResult<PathBuf> {
        (**self).find_release_package_dir(ipn)
    }

    fn link_package(&self, existing_dir: &Path, link_path: &Path) -> SourceResult<()> {
        (**self).link_package(existing_dir, link_path)
    }
}
