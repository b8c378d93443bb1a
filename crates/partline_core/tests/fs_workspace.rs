use partline_core::repo::fs_repo::{read_bom_csv, write_bom_csv};
use partline_core::{
    BomDocument, BomLine, BomRepository, BomService, Diagnostic, FsWorkspace, Ipn,
    PartRepository, ReleaseRepository, ResolveError, SessionLog,
};
use std::fs;
use std::path::Path;

const BOM_HEADER: &str = "Ref,Qnty,Value,Cmp name,Footprint,Description,Vendor,IPN,Datasheet";
const PARTMASTER: &str = "\
IPN,Description,Footprint,Value,Manufacturer,MPN,Datasheet,Priority,Checked
RES-001-0001,10k resistor,0603,10k,Yageo,RC0603FR-0710KL,,1,x
RES-001-0001,resistor,0603,,Vishay,CRCW060310K0,,2,
not-an-ipn,broken row,,,,,,,
ASY-002-0001,frame assembly,,,,,,,
";

fn ipn(text: &str) -> Ipn {
    Ipn::parse(text).expect("valid ipn")
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, content).expect("write fixture");
}

/// Workspace with one board, one released sub-assembly and a partmaster.
fn fixture(root: &Path) {
    write(
        &root.join("boards/PCA-001.csv"),
        &format!(
            "{BOM_HEADER}\n\
             \"R1, R2\",2,10k,R_0603,0603,,,RES-001-0001,\n\
             F1,1,,frame,,,,ASY-002-0001,\n\
             TP1,1,,testpoint,,,,,\n"
        ),
    );
    write(
        &root.join("boards/PCA-001.yml"),
        "remove:\n  - cmpName: testpoint\n",
    );
    write(&root.join("parts/partmaster.csv"), PARTMASTER);
    write(
        &root.join("released/ASY-002-0001/ASY-002-0001.csv"),
        "IPN,Qty,Cmp name\nRES-001-0001,4,R_0603\n",
    );
}

#[test]
fn discovers_design_bom_rules_and_released_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    let workspace = FsWorkspace::new(dir.path());
    let board = ipn("PCA-001-0001");

    let design = workspace.load_design_bom(&board).expect("design BOM found");
    assert_eq!(design.len(), 3);
    let resistor = design.find("RES-001-0001").expect("resistor row");
    assert_eq!(resistor.qty, 2);
    assert_eq!(resistor.ref_tokens(), ["R1", "R2"]);
    assert_eq!(resistor.cmp_name, "R_0603");

    let rules = workspace
        .load_rule_document(&board)
        .expect("rules readable")
        .expect("rules present");
    assert_eq!(rules.remove.len(), 1);

    let rows = workspace
        .load_bom_rows(&ipn("ASY-002-0001"))
        .expect("released rows found");
    assert_eq!(rows, vec![BomLine::new("RES-001-0001", 4).with_cmp_name("R_0603")]);

    let missing = workspace
        .load_bom_rows(&ipn("ASY-404-0001"))
        .expect_err("no such BOM");
    assert!(missing.is_not_found());
}

#[test]
fn partmaster_skips_invalid_rows_with_a_warning() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    let workspace = FsWorkspace::new(dir.path());

    let mut sink: Vec<Diagnostic> = Vec::new();
    let records = workspace.load_part_records(&mut sink).expect("partmaster loads");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].priority, 1);
    assert!(records[0].checked);
    assert_eq!(records[2].priority, 0);

    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].code, "partmaster_row_skipped");
    assert!(sink[0].message.contains("row 4"));
}

#[test]
fn pm_dir_reads_every_table_with_an_ipn_column() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pm_dir = dir.path().join("pm");
    write(&pm_dir.join("a-resistors.csv"), PARTMASTER);
    write(
        &pm_dir.join("b-caps.csv"),
        "IPN,MPN,Priority\nCAP-001-0001,GRM155R71C104KA88D,\n",
    );
    write(&pm_dir.join("notes.csv"), "Topic,Text\nfoo,bar\n");

    let workspace = FsWorkspace::new(dir.path()).with_pm_dir(&pm_dir);
    let mut sink: Vec<Diagnostic> = Vec::new();
    let records = workspace.load_part_records(&mut sink).expect("partmaster loads");
    assert_eq!(records.len(), 4);
    assert_eq!(records[3].ipn, ipn("CAP-001-0001"));
}

#[test]
fn csv_tables_round_trip_through_the_line_model() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("out.csv");

    let mut line = BomLine::new("RES-001-0001", 2).with_reference("R1 R2");
    line.mpn = "RC0603FR-0710KL".to_string();
    line.checked = true;
    let doc = BomDocument::from_lines(vec![line]);

    write_bom_csv(&path, &doc).expect("write table");
    let text = fs::read_to_string(&path).expect("read table");
    assert!(text.starts_with(
        "IPN,Qty,MPN,Manufacturer,Ref,Value,Cmp name,Footprint,Description,Vendor,Datasheet,Checked"
    ));

    let back = read_bom_csv(&path).expect("read back");
    assert_eq!(back, doc.into_lines());

    write_bom_csv(&path, &BomDocument::new()).expect("write empty table");
    assert!(read_bom_csv(&path).expect("read empty").is_empty());
}

#[cfg(unix)]
#[test]
fn resolve_writes_release_links_idempotently() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    let workspace = FsWorkspace::new(dir.path());
    let board = ipn("PCA-001-0001");

    let mut log = SessionLog::new();
    let service = BomService::from_workspace(&workspace, &mut log).expect("partmaster loads");
    let resolved = service.resolve_bom(&board, &mut log).expect("board resolves");

    assert_eq!(resolved.document.len(), 2);
    let resistor = resolved.document.find("RES-001-0001").expect("resistor");
    assert_eq!(resistor.mpn, "RC0603FR-0710KL");

    let combined = resolved.combined.as_ref().expect("frame expanded");
    assert_eq!(combined.find("RES-001-0001").map(|l| l.qty), Some(6));

    let release_dir = workspace.release_dir(&board).expect("release dir");
    assert_eq!(release_dir, dir.path().join("boards/PCA-001-0001"));
    let link = release_dir.join("ASY-002-0001");
    let target = fs::read_link(&link).expect("package link exists");
    assert_eq!(target, Path::new("../../released/ASY-002-0001"));

    // A second run replaces the link and still finds the real package.
    service.resolve_bom(&board, &mut log).expect("second run resolves");
    assert_eq!(fs::read_link(&link).expect("link still exists"), target);

    workspace
        .write_bom(&release_dir.join("PCA-001-0001.csv"), &resolved.document)
        .expect("write corrected BOM");
    let log_path = workspace.log_path(&board);
    assert_eq!(log_path, dir.path().join("boards/PCA-001-0001.log"));
    log.flush_to(&log_path).expect("flush session log");
    assert!(log_path.is_file());
}

#[test]
fn missing_package_directory_aborts_resolution() {
    let dir = tempfile::tempdir().expect("temp dir");
    fixture(dir.path());
    fs::remove_dir_all(dir.path().join("released")).expect("drop released packages");
    let workspace = FsWorkspace::new(dir.path());

    let mut log = SessionLog::new();
    let service = BomService::from_workspace(&workspace, &mut log).expect("partmaster loads");
    let err = service
        .resolve_bom(&ipn("PCA-001-0001"), &mut log)
        .expect_err("package missing");
    assert!(matches!(err, ResolveError::MissingReleasePackage { .. }));
}
