//! BOM resolution use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the resolution pipeline:
//!   rules, partmaster enrichment, sub-assembly rollup.
//! - Keep CLI and other front ends decoupled from storage details.
//!
//! # Invariants
//! - Per-line partmaster misses are diagnostics, never errors.
//! - Any failure while walking the sub-assembly tree aborts the whole call
//!   and no combined BOM is returned.

use crate::model::bom::QuantityOverflow;
use crate::model::ipn::{Ipn, IpnError};
use crate::repo::SourceError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod bom_service;
pub mod partmaster;
pub mod rollup;
pub mod rule_engine;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Fatal errors of one BOM resolution.
#[derive(Debug)]
pub enum ResolveError {
    InvalidIdentifier(IpnError),
    /// Owned part without a released package.
    MissingReleasePackage { ipn: Ipn, source: SourceError },
    /// Owned assembly without a released BOM.
    MissingSubBom { ipn: Ipn, source: SourceError },
    /// Assembly contains itself; `path` ends with the re-entered IPN.
    CyclicAssembly { path: Vec<Ipn> },
    /// Scaled or summed quantity left the `u32` range.
    QuantityOverflow(QuantityOverflow),
    Source(SourceError),
}

impl ResolveError {
    /// Stable code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::MissingReleasePackage { .. } => "missing_release_package",
            Self::MissingSubBom { .. } => "missing_sub_bom",
            Self::CyclicAssembly { .. } => "cyclic_assembly",
            Self::QuantityOverflow(_) => "quantity_overflow",
            Self::Source(_) => "source_error",
        }
    }
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::MissingReleasePackage { ipn, source } => {
                write!(f, "missing release package for {ipn}: {source}")
            }
            Self::MissingSubBom { ipn, source } => {
                write!(f, "missing sub-assembly BOM for {ipn}: {source}")
            }
            Self::CyclicAssembly { path } => {
                let chain: Vec<&str> = path.iter().map(Ipn::as_str).collect();
                write!(f, "assembly contains itself: {}", chain.join(" -> "))
            }
            Self::QuantityOverflow(err) => write!(f, "{err}"),
            Self::Source(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            Self::MissingReleasePackage { source, .. } => Some(source),
            Self::MissingSubBom { source, .. } => Some(source),
            Self::CyclicAssembly { .. } => None,
            Self::QuantityOverflow(err) => Some(err),
            Self::Source(err) => Some(err),
        }
    }
}

impl From<IpnError> for ResolveError {
    fn from(value: IpnError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

impl From<QuantityOverflow> for ResolveError {
    fn from(value: QuantityOverflow) -> Self {
        Self::QuantityOverflow(value)
    }
}

impl From<SourceError> for ResolveError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}
