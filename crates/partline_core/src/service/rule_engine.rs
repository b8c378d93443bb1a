//! Rule engine applying correction documents to a BOM.
//!
//! # Responsibility
//! - Apply remove rules, then add rules, each against the previous rule's output.
//! - Sort the corrected BOM by IPN.
//!
//! # Invariants
//! - Every add rule yields a freshly built line; no line is shared between rules.
//! - The engine is infallible; malformed documents are rejected while parsing.

use crate::model::bom::BomDocument;
use crate::model::rules::{AddRule, ModRule, RemoveRule, RuleDocument};
use log::debug;
use serde::{Deserialize, Serialize};

/// What happens to a line whose quantity reaches zero after a reference is
/// removed from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroQuantityPolicy {
    /// Drop the line from the corrected BOM.
    #[default]
    Drop,
    /// Keep the line with quantity zero.
    Keep,
}

/// Rule engine configured with a zero-quantity policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleEngine {
    zero_quantity: ZeroQuantityPolicy,
}

impl RuleEngine {
    pub fn new(zero_quantity: ZeroQuantityPolicy) -> Self {
        Self { zero_quantity }
    }

    pub fn zero_quantity(&self) -> ZeroQuantityPolicy {
        self.zero_quantity
    }

    /// Applies every rule of `rules` in order and returns the sorted result.
    pub fn apply(&self, document: BomDocument, rules: &RuleDocument) -> BomDocument {
        let input_lines = document.len();
        let mut out = document;
        for rule in rules.ordered_rules() {
            self.apply_rule(&mut out, rule);
        }
        out.sort_by_ipn();

        debug!(
            "event=rules_apply module=rule_engine status=ok removes={} adds={} lines_in={} lines_out={}",
            rules.remove.len(),
            rules.add.len(),
            input_lines,
            out.len()
        );
        out
    }

    /// Applies one rule in place.
    pub fn apply_rule(&self, doc: &mut BomDocument, rule: ModRule<'_>) {
        match rule {
            ModRule::Remove(remove) => self.apply_remove(doc, remove),
            ModRule::Add(add) => apply_add(doc, add),
        }
    }

    fn apply_remove(&self, doc: &mut BomDocument, rule: &RemoveRule) {
        if let Some(name) = rule.cmp_name.as_deref().filter(|v| !v.is_empty()) {
            doc.retain(|line| line.cmp_name != name);
        }

        if let Some(reference) = rule.reference.as_deref().filter(|v| !v.trim().is_empty()) {
            let drop_emptied = self.zero_quantity == ZeroQuantityPolicy::Drop;
            let lines = std::mem::take(doc).into_lines();
            *doc = lines
                .into_iter()
                .filter_map(|mut line| {
                    line.remove_ref(reference);
                    if line.qty == 0 && drop_emptied {
                        None
                    } else {
                        Some(line)
                    }
                })
                .collect();
        }
    }
}

fn apply_add(doc: &mut BomDocument, rule: &AddRule) {
    doc.push(rule.to_line());
}

/// Applies `rules` with the default engine (zero-quantity lines dropped).
pub fn apply_mod_rules(document: BomDocument, rules: &RuleDocument) -> BomDocument {
    RuleEngine::default().apply(document, rules)
}
