use partline_core::{
    apply_mod_rules, AddRule, BomDocument, BomLine, RemoveRule, RuleDocument, RuleDocumentError,
    RuleEngine, ZeroQuantityPolicy,
};

fn design_bom() -> BomDocument {
    BomDocument::from_lines(vec![
        BomLine::new("TPT-001-0002", 2)
            .with_cmp_name("Test point 2")
            .with_reference("TP4,TP5"),
        BomLine::new("RES-001-0100", 2)
            .with_cmp_name("100K_100mw")
            .with_reference("R1,R2"),
        BomLine::new("DIO-001-0001", 4)
            .with_cmp_name("diode")
            .with_reference("D1,D2,D13,D14"),
    ])
}

const RULES_YAML: &str = r#"
description: drop test points, D13 is not fitted, add screws
remove:
  - cmpName: Test point 2
  - ref: D13
add:
  - cmpName: "screw #4 2"
    ref: S3
    ipn: SCR-002-0002
"#;

#[test]
fn removes_then_adds_and_sorts_by_ipn() {
    let rules = RuleDocument::from_yaml_str(RULES_YAML).expect("rules should parse");
    let out = apply_mod_rules(design_bom(), &rules);

    assert_eq!(out.len(), 3);
    let names: Vec<&str> = out.iter().map(|line| line.cmp_name.as_str()).collect();
    assert_eq!(names, ["diode", "100K_100mw", "screw #4 2"]);

    let diode = &out.lines()[0];
    assert_eq!(diode.qty, 3);
    assert_eq!(diode.ref_tokens(), ["D1", "D2", "D14"]);

    assert_eq!(out.lines()[1].qty, 2);
    assert_eq!(out.lines()[1].reference, "R1,R2");

    let screw = &out.lines()[2];
    assert_eq!(screw.ipn, "SCR-002-0002");
    assert_eq!(screw.qty, 1);
    assert_eq!(screw.reference, "S3");
}

fn remove_ref_rules(reference: &str) -> RuleDocument {
    RuleDocument {
        remove: vec![RemoveRule {
            cmp_name: None,
            reference: Some(reference.to_string()),
        }],
        ..RuleDocument::default()
    }
}

/// Lines whose quantity column disagrees with their designators.
fn miscounted_bom() -> BomDocument {
    BomDocument::from_lines(vec![
        BomLine::new("DIO-001-0001", 4)
            .with_cmp_name("diode")
            .with_reference("D1,D2,D13,D14"),
        BomLine::new("RES-001-0100", 5)
            .with_cmp_name("100K_100mw")
            .with_reference("R1,R2"),
        BomLine::new("SCR-002-0002", 3).with_cmp_name("screw"),
    ])
}

#[test]
fn remove_by_reference_recounts_every_line() {
    let out = apply_mod_rules(miscounted_bom(), &remove_ref_rules("D13"));

    let diode = out.find("DIO-001-0001").expect("diode kept");
    assert_eq!(diode.reference, "D1, D2, D14");
    assert_eq!(diode.qty, 3);

    let resistor = out.find("RES-001-0100").expect("resistor kept");
    assert_eq!(resistor.reference, "R1,R2");
    assert_eq!(resistor.qty, 2);

    // No designators left means quantity zero.
    assert!(out.find("SCR-002-0002").is_none());
    assert_eq!(out.len(), 2);
}

#[test]
fn recounted_lines_stay_at_zero_with_keep_policy() {
    let engine = RuleEngine::new(ZeroQuantityPolicy::Keep);
    let out = engine.apply(miscounted_bom(), &remove_ref_rules("D13"));

    assert_eq!(out.len(), 3);
    assert_eq!(out.find("RES-001-0100").map(|line| line.qty), Some(2));
    assert_eq!(out.find("SCR-002-0002").map(|line| line.qty), Some(0));
}

#[test]
fn emptied_line_is_dropped_by_default() {
    let doc = BomDocument::from_lines(vec![
        BomLine::new("CAP-001-0001", 1)
            .with_cmp_name("bulk cap")
            .with_reference("C7"),
        BomLine::new("CAP-001-0002", 0).with_cmp_name("unfitted"),
        BomLine::new("CAP-001-0003", 2)
            .with_cmp_name("decoupling")
            .with_reference("C8 C9"),
    ]);

    let out = RuleEngine::default().apply(doc, &remove_ref_rules("C7"));
    assert!(out.find("CAP-001-0001").is_none());
    assert!(out.find("CAP-001-0002").is_none());
    assert_eq!(out.find("CAP-001-0003").map(|line| line.qty), Some(2));
}

#[test]
fn emptied_line_is_kept_with_keep_policy() {
    let doc = BomDocument::from_lines(vec![BomLine::new("CAP-001-0001", 1)
        .with_cmp_name("bulk cap")
        .with_reference("C7")]);

    let engine = RuleEngine::new(ZeroQuantityPolicy::Keep);
    let out = engine.apply(doc, &remove_ref_rules("C7"));
    let line = out.find("CAP-001-0001").expect("line kept");
    assert_eq!(line.qty, 0);
    assert!(line.reference.is_empty());
}

#[test]
fn every_add_rule_builds_its_own_line() {
    let add = |name: &str, reference: &str, ipn: &str| AddRule {
        cmp_name: name.to_string(),
        reference: reference.to_string(),
        ipn: ipn.to_string(),
        ..AddRule::default()
    };
    let rules = RuleDocument {
        add: vec![
            add("screw", "S1 S2", "SCR-002-0002"),
            add("label", "", "LBL-001-0001"),
            add("standoff", "H1,H2,H3", "STD-003-0001"),
        ],
        ..RuleDocument::default()
    };

    let out = apply_mod_rules(BomDocument::new(), &rules);
    assert_eq!(out.len(), 3);

    let label = out.find("LBL-001-0001").expect("label added");
    assert_eq!((label.cmp_name.as_str(), label.qty), ("label", 1));
    let screw = out.find("SCR-002-0002").expect("screw added");
    assert_eq!((screw.cmp_name.as_str(), screw.qty), ("screw", 2));
    let standoff = out.find("STD-003-0001").expect("standoff added");
    assert_eq!((standoff.cmp_name.as_str(), standoff.qty), ("standoff", 3));
}

#[test]
fn added_lines_count_references_like_later_removals() {
    let rules = RuleDocument::from_yaml_str(
        "add:\n  - cmpName: screw\n    ref: S1 S2\n    ipn: SCR-002-0002\n",
    )
    .expect("rules parse");
    let added = apply_mod_rules(BomDocument::new(), &rules);
    assert_eq!(added.find("SCR-002-0002").map(|line| line.qty), Some(2));

    let out = apply_mod_rules(added, &remove_ref_rules("S2"));
    let screw = out.find("SCR-002-0002").expect("one screw left");
    assert_eq!((screw.reference.as_str(), screw.qty), ("S1", 1));
}

#[test]
fn empty_document_changes_nothing_but_order() {
    let rules = RuleDocument::from_yaml_str("").expect("empty file is valid");
    assert!(rules.is_empty());

    let out = apply_mod_rules(design_bom(), &rules);
    let order: Vec<&str> = out.iter().map(|line| line.ipn.as_str()).collect();
    assert_eq!(order, ["DIO-001-0001", "RES-001-0100", "TPT-001-0002"]);
}

#[test]
fn malformed_documents_fail_before_any_rule_runs() {
    let err = RuleDocument::from_yaml_str("remove: [").expect_err("broken yaml");
    assert!(matches!(err, RuleDocumentError::Parse(_)));

    let err = RuleDocument::from_yaml_str("remove:\n  - {}\n").expect_err("empty remove");
    assert_eq!(err, RuleDocumentError::EmptyRemoveRule { index: 0 });

    let err = RuleDocument::from_yaml_str("add:\n  - ref: S1\n    ipn: SCR-002-0002\n")
        .expect_err("nameless add");
    assert_eq!(err, RuleDocumentError::MissingComponentName { index: 0 });

    let err = RuleDocument::from_yaml_str("add:\n  - cmpName: screw\n    ipn: SCR-2-2\n")
        .expect_err("bad ipn");
    assert!(matches!(err, RuleDocumentError::InvalidIpn { index: 0, .. }));
}
