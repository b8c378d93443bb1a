//! Filesystem-backed workspace.
//!
//! # Responsibility
//! - Discover design BOMs, rule documents, released BOMs and release packages
//!   anywhere below the workspace root.
//! - Read and write line-item CSV tables and the partmaster.
//! - Create release directories and package links.
//!
//! # Invariants
//! - Discovery never follows symlinks, so package links created by earlier
//!   runs are not mistaken for packages.
//! - When a name occurs more than once, the last match in walk order wins.
//! - Written BOMs are always sorted by IPN.

use super::{BomRepository, PartRepository, ReleaseRepository, SourceError, SourceResult};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::bom::{BomDocument, BomLine};
use crate::model::fields::{deserialize_flag, deserialize_priority};
use crate::model::ipn::Ipn;
use crate::model::part::PartRecord;
use crate::model::rules::RuleDocument;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const PARTMASTER_FILE_NAME: &str = "partmaster.csv";
const IPN_COLUMN: &str = "IPN";
const BOM_HEADERS: &[&str] = &[
    "IPN",
    "Qty",
    "MPN",
    "Manufacturer",
    "Ref",
    "Value",
    "Cmp name",
    "Footprint",
    "Description",
    "Vendor",
    "Datasheet",
    "Checked",
];

/// Partmaster table row before IPN validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartmasterRow {
    #[serde(rename = "IPN")]
    ipn: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Footprint")]
    footprint: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Manufacturer")]
    manufacturer: String,
    #[serde(rename = "MPN")]
    mpn: String,
    #[serde(rename = "Datasheet")]
    datasheet: String,
    #[serde(rename = "Priority", deserialize_with = "deserialize_priority")]
    priority: i32,
    #[serde(rename = "Checked", deserialize_with = "deserialize_flag")]
    checked: bool,
}

impl PartmasterRow {
    fn into_record(self, ipn: Ipn) -> PartRecord {
        PartRecord {
            ipn,
            description: self.description,
            footprint: self.footprint,
            value: self.value,
            manufacturer: self.manufacturer,
            mpn: self.mpn,
            datasheet: self.datasheet,
            checked: self.checked,
            priority: self.priority,
        }
    }
}

/// Workspace rooted at a directory tree.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
    pm_dir: Option<PathBuf>,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pm_dir: None,
        }
    }

    /// Reads the partmaster from every CSV file in `pm_dir` instead of a
    /// single `partmaster.csv`.
    pub fn with_pm_dir(mut self, pm_dir: impl Into<PathBuf>) -> Self {
        self.pm_dir = Some(pm_dir.into());
        self
    }

    /// Finds a regular file named `name` below the root.
    pub fn find_file(&self, name: &str) -> SourceResult<PathBuf> {
        self.find_entry(name, |file_type| file_type.is_file())
    }

    /// Finds a directory named `name` below the root.
    pub fn find_dir(&self, name: &str) -> SourceResult<PathBuf> {
        self.find_entry(name, |file_type| file_type.is_dir())
    }

    fn find_entry(
        &self,
        name: &str,
        wanted: impl Fn(&fs::FileType) -> bool,
    ) -> SourceResult<PathBuf> {
        let mut found = None;
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| SourceError::Io {
                path: err.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: io::Error::from(err),
            })?;
            if wanted(&entry.file_type()) && entry.file_name() == name {
                found = Some(entry.into_path());
            }
        }
        found.ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    /// Path of the design-tool BOM (`CCC-NNN.csv`) for `board`.
    pub fn design_bom_path(&self, board: &Ipn) -> SourceResult<PathBuf> {
        self.find_file(&format!("{}.csv", board.base()))
    }

    /// Where the session log for `board` is written: next to its design BOM,
    /// or in the root when the BOM cannot be located.
    pub fn log_path(&self, board: &Ipn) -> PathBuf {
        let file_name = format!("{board}.log");
        match self.design_bom_path(board) {
            Ok(path) => parent_dir(&path).join(file_name),
            Err(_) => self.root.join(file_name),
        }
    }

    /// Writes `doc` sorted by IPN to `path`.
    pub fn write_bom(&self, path: &Path, doc: &BomDocument) -> SourceResult<()> {
        let mut sorted = doc.clone();
        sorted.sort_by_ipn();
        write_bom_csv(path, &sorted)?;
        info!(
            "event=bom_write module=fs_repo status=ok path={} lines={}",
            path.display(),
            sorted.len()
        );
        Ok(())
    }

    fn partmaster_files(&self) -> SourceResult<Vec<PathBuf>> {
        let Some(pm_dir) = &self.pm_dir else {
            return Ok(vec![self.find_file(PARTMASTER_FILE_NAME)?]);
        };

        let entries = fs::read_dir(pm_dir).map_err(|source| SourceError::Io {
            path: pm_dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: pm_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(SourceError::NotFound(format!(
                "*.csv in {}",
                pm_dir.display()
            )));
        }
        Ok(files)
    }
}

impl BomRepository for FsWorkspace {
    fn load_design_bom(&self, board: &Ipn) -> SourceResult<BomDocument> {
        let path = self.design_bom_path(board)?;
        Ok(BomDocument::from_lines(read_bom_csv(&path)?))
    }

    fn load_rule_document(&self, board: &Ipn) -> SourceResult<Option<RuleDocument>> {
        let bom_path = match self.design_bom_path(board) {
            Ok(path) => path,
            Err(SourceError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let path = parent_dir(&bom_path).join(format!("{}.yml", board.base()));
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let document = RuleDocument::from_yaml_str(&text)
            .map_err(|source| SourceError::RuleDocument { path, source })?;
        Ok(Some(document))
    }

    fn load_bom_rows(&self, ipn: &Ipn) -> SourceResult<Vec<BomLine>> {
        let path = self.find_file(&format!("{ipn}.csv"))?;
        read_bom_csv(&path)
    }
}

impl PartRepository for FsWorkspace {
    fn load_part_records(&self, sink: &mut dyn DiagnosticSink) -> SourceResult<Vec<PartRecord>> {
        let mut records = Vec::new();
        for path in self.partmaster_files()? {
            read_partmaster_csv(&path, &mut records, sink)?;
        }
        info!(
            "event=partmaster_load module=fs_repo status=ok records={}",
            records.len()
        );
        Ok(records)
    }
}

impl ReleaseRepository for FsWorkspace {
    fn release_dir(&self, board: &Ipn) -> SourceResult<PathBuf> {
        let bom_path = self.design_bom_path(board)?;
        let dir = parent_dir(&bom_path).join(board.as_str());
        fs::create_dir_all(&dir).map_err(|source| SourceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn find_release_package_dir(&self, ipn: &Ipn) -> SourceResult<PathBuf> {
        self.find_dir(ipn.as_str())
    }

    fn link_package(&self, existing_dir: &Path, link_path: &Path) -> SourceResult<()> {
        let io_err = |source: io::Error| SourceError::Io {
            path: link_path.to_path_buf(),
            source,
        };

        if let Ok(meta) = fs::symlink_metadata(link_path) {
            if !meta.file_type().is_symlink() {
                return Err(io_err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "refusing to replace a non-link entry",
                )));
            }
            remove_link(link_path).map_err(io_err)?;
        }

        let link_dir = parent_dir(link_path);
        let target_abs = fs::canonicalize(existing_dir).map_err(|source| SourceError::Io {
            path: existing_dir.to_path_buf(),
            source,
        })?;
        let link_dir_abs = fs::canonicalize(&link_dir).map_err(io_err)?;
        let target = relative_path(&link_dir_abs, &target_abs);

        create_dir_link(&target, link_path).map_err(io_err)?;
        debug!(
            "event=package_link module=fs_repo status=ok link={} target={}",
            link_path.display(),
            target.display()
        );
        Ok(())
    }
}

/// Reads a line-item table. Header whitespace is ignored and missing columns
/// default to empty.
pub fn read_bom_csv(path: &Path) -> SourceResult<Vec<BomLine>> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut lines = Vec::new();
    for row in reader.deserialize::<BomLine>() {
        lines.push(row.map_err(csv_err)?);
    }
    debug!(
        "event=bom_read module=fs_repo status=ok path={} lines={}",
        path.display(),
        lines.len()
    );
    Ok(lines)
}

/// Writes a line-item table in document order.
pub fn write_bom_csv(path: &Path, doc: &BomDocument) -> SourceResult<()> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    if doc.is_empty() {
        writer.write_record(BOM_HEADERS).map_err(csv_err)?;
    }
    for line in doc {
        writer.serialize(line).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_partmaster_csv(
    path: &Path,
    records: &mut Vec<PartRecord>,
    sink: &mut dyn DiagnosticSink,
) -> SourceResult<()> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let has_ipn_column = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .any(|header| header == IPN_COLUMN);
    if !has_ipn_column {
        debug!(
            "event=partmaster_skip_file module=fs_repo status=skipped path={} reason=no_ipn_column",
            path.display()
        );
        return Ok(());
    }

    for (index, row) in reader.deserialize::<PartmasterRow>().enumerate() {
        let row_number = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                sink.report(Diagnostic::warning(
                    "partmaster_row_skipped",
                    format!("{} row {row_number}: {err}", path.display()),
                ));
                continue;
            }
        };
        match Ipn::parse(row.ipn.trim()) {
            Ok(ipn) => records.push(row.into_record(ipn)),
            Err(err) => sink.report(Diagnostic::warning(
                "partmaster_row_skipped",
                format!("{} row {row_number}: {err}", path.display()),
            )),
        }
    }
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Path from directory `from` to `to`; both must be absolute.
fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(unix)]
fn create_dir_link(target: &Path, link_path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link_path)
}

#[cfg(windows)]
fn create_dir_link(target: &Path, link_path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link_path)
}

#[cfg(unix)]
fn remove_link(link_path: &Path) -> io::Result<()> {
    fs::remove_file(link_path)
}

#[cfg(windows)]
fn remove_link(link_path: &Path) -> io::Result<()> {
    fs::remove_dir(link_path).or_else(|_| fs::remove_file(link_path))
}

#[cfg(test)]
mod tests {
    use super::relative_path;
    use std::path::{Path, PathBuf};

    #[test]
    fn relative_path_walks_up_and_down() {
        assert_eq!(
            relative_path(Path::new("/w/boards/PCA-001-0001"), Path::new("/w/rel/PCB-002-0001")),
            PathBuf::from("../../rel/PCB-002-0001")
        );
        assert_eq!(
            relative_path(Path::new("/w/a"), Path::new("/w/a/b")),
            PathBuf::from("b")
        );
    }
}
