use std::process::Command;

use cphd_testkit::CphdBuilder;
use cphd_types::SampleType;
use tempfile::NamedTempFile;

fn fixture() -> NamedTempFile {
    CphdBuilder::new(SampleType::ComplexFloat32)
        .channel(8, 16)
        .channel(4, 4)
        .write_temp()
        .unwrap()
}

fn cphd_extract() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cphd-extract"))
}

#[test]
fn test_prints_xml_and_counts() {
    let tmp = fixture();
    let output = cphd_extract()
        .arg(tmp.path())
        .args(["--workers", "3", "--quiet"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("<?xml"));
    assert!(stdout.contains("Number of channels: 2"));
    assert!(stdout.contains("PvpData size: 192 (channel 0)"));
    assert!(stdout.contains("Wideband data cell count: 144"));
}

#[test]
fn test_json_output() {
    let tmp = fixture();
    let output = cphd_extract()
        .arg(tmp.path())
        .args(["--json", "--channel", "1", "-q"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["num_channels"], 2);
    assert_eq!(json["cell_count"], 16);
    assert_eq!(json["sample_type"], "ComplexFloat32");
}

#[test]
fn test_missing_file_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = cphd_extract()
        .arg(dir.path().join("missing.cphd"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot open"));
}

#[test]
fn test_missing_schema_exits_with_error() {
    let tmp = fixture();
    let output = cphd_extract()
        .arg(tmp.path())
        .args(["--schema", "/nonexistent/cphd.xsd"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Schema file not found"));
}

#[test]
fn test_zero_workers_rejected() {
    let tmp = fixture();
    let output = cphd_extract()
        .arg(tmp.path())
        .args(["--workers", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}
