//! Command-line entry point.
//!
//! # Responsibility
//! - Resolve one board BOM inside a workspace directory.
//! - Write the corrected BOM, the combined BOM and the session log.
//!
//! # Invariants
//! - The session log is written on every exit path once the board IPN parsed.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use partline_core::{
    init_logging, workspace_log_dir, BomDocument, BomService, Diagnostic, DiagnosticSink,
    FsWorkspace, Ipn, PartlineConfig, ReleaseRepository, SessionLog,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "partline")]
#[command(about = "Resolve a board BOM against the partmaster and released sub-assemblies")]
#[command(version)]
struct Cli {
    /// Board IPN to resolve, e.g. PCA-001-0001
    #[arg(long)]
    bom: String,

    /// Workspace directory searched for BOMs, packages and the partmaster
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Mirror log output to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli
        .dir
        .canonicalize()
        .with_context(|| format!("workspace directory {} not found", cli.dir.display()))?;

    let config = PartlineConfig::load(&root)?;
    init_logging(&config.log_level, &workspace_log_dir(&root), cli.verbose)?;

    let board = Ipn::parse(cli.bom.trim())
        .with_context(|| format!("invalid board IPN `{}`", cli.bom))?;

    let mut workspace = FsWorkspace::new(&root);
    if let Some(pm_dir) = &config.pm_dir {
        workspace = workspace.with_pm_dir(pm_dir);
    }

    let mut session = SessionLog::new();
    let outcome = run(&workspace, &config, &board, &mut session);
    if let Err(err) = &outcome {
        session.report(Diagnostic::error("resolve_failed", format!("{err:#}")));
    }

    let log_path = workspace.log_path(&board);
    session
        .flush_to(&log_path)
        .with_context(|| format!("failed to write session log {}", log_path.display()))?;
    if !session.is_empty() {
        eprintln!(
            "{} diagnostic(s) written to {}",
            session.entries().len(),
            log_path.display()
        );
    }

    for path in outcome? {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn run(
    workspace: &FsWorkspace,
    config: &PartlineConfig,
    board: &Ipn,
    session: &mut SessionLog,
) -> Result<Vec<PathBuf>> {
    let codec = config.codec()?;
    let service = BomService::from_workspace(workspace, session)?
        .with_codec(codec)
        .with_rule_engine(config.rule_engine());
    info!(
        "event=cli_resolve module=cli status=start board={} parts={}",
        board,
        service.index().len()
    );

    let resolved = service.resolve_bom(board, session)?;
    let release_dir = service.workspace().release_dir(board)?;

    let mut written = Vec::new();
    written.push(write_output(
        workspace,
        &release_dir,
        &format!("{board}.csv"),
        &resolved.document,
    )?);
    if let Some(combined) = &resolved.combined {
        written.push(write_output(
            workspace,
            &release_dir,
            &format!("{board}-all.csv"),
            combined,
        )?);
    }
    Ok(written)
}

fn write_output(
    workspace: &FsWorkspace,
    release_dir: &Path,
    name: &str,
    document: &BomDocument,
) -> Result<PathBuf> {
    let path = release_dir.join(name);
    workspace
        .write_bom(&path, document)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
