//! Core BOM resolution engine for partline.
//! This crate owns identifier rules, BOM corrections and sub-assembly rollup.

pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, PartlineConfig};
pub use diagnostics::{Diagnostic, DiagnosticSink, SessionLog, Severity};
pub use logging::{default_log_level, init_logging, workspace_log_dir, LoggingError};
pub use model::bom::{BomDocument, BomLine, QuantityOp, QuantityOverflow};
pub use model::ipn::{Ipn, IpnClass, IpnCodec, IpnError};
pub use model::part::PartRecord;
pub use model::rules::{AddRule, ModRule, RemoveRule, RuleDocument, RuleDocumentError};
pub use repo::fs_repo::FsWorkspace;
pub use repo::memory_repo::MemoryWorkspace;
pub use repo::{BomRepository, PartRepository, ReleaseRepository, SourceError, SourceResult};
pub use service::bom_service::{BomService, ResolvedBom};
pub use service::partmaster::{
    attach_partmaster, lower_priority_wins, PartmasterError, PartmasterIndex,
};
pub use service::rollup::RollupResolver;
pub use service::rule_engine::{apply_mod_rules, RuleEngine, ZeroQuantityPolicy};
pub use service::{ResolveError, ResolveResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
