//! Domain model for parts, BOM lines and correction rules.
//!
//! # Responsibility
//! - Define the canonical data structures used by the resolution engine.
//! - Keep identifier syntax in one codec so every layer validates the same way.
//!
//! # Invariants
//! - Identifiers are only produced through `Ipn::parse` / `Ipn::from_parts`.
//! - Models carry no I/O; repositories load and persist them.

pub mod bom;
pub(crate) mod fields;
pub mod ipn;
pub mod part;
pub mod rules;
