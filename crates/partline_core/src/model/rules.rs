//! Declarative BOM correction rules.
//!
//! # Responsibility
//! - Define the rule document shape stored next to a design-tool BOM.
//! - Reject malformed documents before any rule is applied.
//!
//! # Invariants
//! - Remove rules run before add rules, each in document order.
//! - A validated add rule always carries a component name and a valid IPN.

use crate::model::bom::{split_refs, BomLine};
use crate::model::ipn::Ipn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Removes lines by component name and/or one reference designator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveRule {
    #[serde(rename = "cmpName", alias = "componentName")]
    pub cmp_name: Option<String>,
    #[serde(rename = "ref", alias = "reference")]
    pub reference: Option<String>,
}

/// Adds one line that the design tool does not export (screws, labels, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddRule {
    #[serde(rename = "cmpName", alias = "componentName")]
    pub cmp_name: String,
    #[serde(rename = "ref", alias = "reference")]
    pub reference: String,
    #[serde(alias = "identifier")]
    pub ipn: String,
    pub value: String,
    pub footprint: String,
    pub description: String,
    pub vendor: String,
}

impl AddRule {
    /// Builds a fresh line for this rule.
    ///
    /// Quantity is the reference token count, never less than one. Tokens split
    /// on commas and whitespace, the same way `BomLine::remove_ref` sees them.
    pub fn to_line(&self) -> BomLine {
        let qty = split_refs(&self.reference).len().max(1) as u32;
        BomLine {
            ipn: self.ipn.clone(),
            qty,
            reference: self.reference.clone(),
            cmp_name: self.cmp_name.clone(),
            value: self.value.clone(),
            footprint: self.footprint.clone(),
            description: self.description.clone(),
            vendor: self.vendor.clone(),
            ..BomLine::default()
        }
    }
}

/// One rule in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModRule<'a> {
    Remove(&'a RemoveRule),
    Add(&'a AddRule),
}

/// Rule document as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDocument {
    pub description: String,
    pub remove: Vec<RemoveRule>,
    pub add: Vec<AddRule>,
}

impl RuleDocument {
    /// Parses and validates a YAML rule document.
    pub fn from_yaml_str(text: &str) -> Result<Self, RuleDocumentError> {
        // An empty file is a document with no rules.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: Self = serde_yaml::from_str(text)
            .map_err(|err| RuleDocumentError::Parse(err.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Checks rule-level invariants.
    ///
    /// # Errors
    /// - `EmptyRemoveRule` when a remove rule names neither a component nor a reference.
    /// - `MissingComponentName` when an add rule has a blank name.
    /// - `InvalidIpn` when an add rule IPN does not parse.
    pub fn validate(&self) -> Result<(), RuleDocumentError> {
        for (index, rule) in self.remove.iter().enumerate() {
            let has_name = rule.cmp_name.as_deref().is_some_and(|v| !v.trim().is_empty());
            let has_ref = rule.reference.as_deref().is_some_and(|v| !v.trim().is_empty());
            if !has_name && !has_ref {
                return Err(RuleDocumentError::EmptyRemoveRule { index });
            }
        }

        for (index, rule) in self.add.iter().enumerate() {
            if rule.cmp_name.trim().is_empty() {
                return Err(RuleDocumentError::MissingComponentName { index });
            }
            if let Err(err) = Ipn::parse(&rule.ipn) {
                return Err(RuleDocumentError::InvalidIpn {
                    index,
                    reason: err.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Rules in application order: removes first, then adds.
    pub fn ordered_rules(&self) -> impl Iterator<Item = ModRule<'_>> {
        self.remove
            .iter()
            .map(ModRule::Remove)
            .chain(self.add.iter().map(ModRule::Add))
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Malformed rule document errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDocumentError {
    Parse(String),
    EmptyRemoveRule { index: usize },
    MissingComponentName { index: usize },
    InvalidIpn { index: usize, reason: String },
}

impl Display for RuleDocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "malformed rule document: {message}"),
            Self::EmptyRemoveRule { index } => write!(
                f,
                "malformed rule document: remove[{index}] needs cmpName or ref"
            ),
            Self::MissingComponentName { index } => {
                write!(f, "malformed rule document: add[{index}] needs cmpName")
            }
            Self::InvalidIpn { index, reason } => {
                write!(f, "malformed rule document: add[{index}]: {reason}")
            }
        }
    }
}

impl Error for RuleDocumentError {}

#[cfg(test)]
mod tests {
    use super::{AddRule, ModRule, RuleDocument, RuleDocumentError};

    const RULES: &str = r#"
description: modify bom
remove:
  - cmpName: Test point 2
  - ref: D13
add:
  - cmpName: "screw #4 2"
    ref: S3
    ipn: SCR-002-0002
"#;

    #[test]
    fn parses_rule_document() {
        let document = RuleDocument::from_yaml_str(RULES).expect("valid rule document");
        assert_eq!(document.description, "modify bom");
        assert_eq!(document.remove.len(), 2);
        assert_eq!(document.remove[0].cmp_name.as_deref(), Some("Test point 2"));
        assert_eq!(document.remove[1].reference.as_deref(), Some("D13"));
        assert_eq!(document.add[0].ipn, "SCR-002-0002");

        let kinds: Vec<bool> = document
            .ordered_rules()
            .map(|rule| matches!(rule, ModRule::Remove(_)))
            .collect();
        assert_eq!(kinds, vec![true, true, false]);
    }

    #[test]
    fn accepts_spelled_out_field_names() {
        let document = RuleDocument::from_yaml_str(
            "add:\n  - componentName: label\n    reference: L1, L2\n    identifier: LBL-001-0001\n",
        )
        .expect("aliases should parse");
        assert_eq!(document.add[0].cmp_name, "label");
        assert_eq!(document.add[0].to_line().qty, 2);
    }

    #[test]
    fn rejects_empty_remove_rule() {
        let err = RuleDocument::from_yaml_str("remove:\n  - cmpName: \"\"\n").unwrap_err();
        assert_eq!(err, RuleDocumentError::EmptyRemoveRule { index: 0 });
    }

    #[test]
    fn rejects_add_rule_with_bad_ipn() {
        let err =
            RuleDocument::from_yaml_str("add:\n  - cmpName: screw\n    ipn: scr-1\n").unwrap_err();
        assert!(matches!(err, RuleDocumentError::InvalidIpn { index: 0, .. }));
    }

    #[test]
    fn rejects_unparseable_yaml() {
        let err = RuleDocument::from_yaml_str("remove: [unterminated").unwrap_err();
        assert!(matches!(err, RuleDocumentError::Parse(_)));
    }

    #[test]
    fn add_rule_without_refs_counts_one() {
        let rule = AddRule {
            cmp_name: "manual".to_string(),
            ipn: "DOC-001-0001".to_string(),
            ..AddRule::default()
        };
        assert_eq!(rule.to_line().qty, 1);
    }
}
