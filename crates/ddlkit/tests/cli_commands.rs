#![cfg(feature = "cli")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<adtf:ddl xmlns:adtf="adtf">
  <header>
    <language_version>4.1</language_version>
    <author>cli tests</author>
    <date_creation>2026-01-01</date_creation>
    <date_change>2026-01-01</date_change>
    <description>cli fixtures</description>
  </header>
  <datatypes>
    <datatype name="tUInt8" size="8"/>
    <datatype name="tUInt16" size="16"/>
    <datatype name="tInt32" size="32"/>
    <datatype name="tFloat64" size="64"/>
  </datatypes>
  <enums>
    <enum name="Mode" type="tUInt8">
      <element name="OFF" value="0"/>
      <element name="ON" value="1"/>
    </enum>
  </enums>
  <structs>
    <struct name="Pos" version="1">
      <element name="x" type="tInt32" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="4"/></element>
      <element name="y" type="tInt32" arraysize="1"><serialized bytepos="4" byteorder="LE"/><deserialized alignment="4"/></element>
      <element name="mode" type="Mode" arraysize="1"><serialized bytepos="8" byteorder="LE"/><deserialized alignment="1"/></element>
    </struct>
    <struct name="Out" version="1">
      <element name="x" type="tFloat64" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="8"/></element>
      <element name="n" type="tUInt16" arraysize="1"><serialized bytepos="8" byteorder="LE"/><deserialized alignment="2"/></element>
    </struct>
  </structs>
</adtf:ddl>
"#;

const BROKEN: &str = r#"<ddl>
  <header><language_version>4.1</language_version></header>
  <structs>
    <struct name="Bad" version="1">
      <element name="x" type="Nope" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="1"/></element>
    </struct>
  </structs>
</ddl>
"#;

const MAPPING: &str = r#"<mapping>
  <header><language_version>1.00</language_version></header>
  <sources>
    <source name="pos" type="Pos"/>
  </sources>
  <targets>
    <target name="out" type="Out">
      <assignment to="x" from="pos.x" transformation="double"/>
      <assignment to="n" function="trigger_counter()"/>
      <trigger type="signal" variable="pos"/>
    </target>
  </targets>
  <transformations>
    <polynomial name="double" b="2"/>
  </transformations>
</mapping>
"#;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ddlkit-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("fixture should be writable");
    path
}

fn ddlkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ddlkit"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("ddlkit should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn validate_reports_levels_and_exit_codes() {
    let dir = unique_temp_dir("validate");
    let good = write(&dir, "good.ddl", SCHEMA);
    let broken = write(&dir, "broken.ddl", BROKEN);
    let garbage = write(&dir, "garbage.ddl", "<notddl/>");

    let output = ddlkit(&["validate", good.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("validation-report.schema.json"));
    assert!(out.contains("\"level\":\"valid\""));
    assert!(out.contains("\"problems\":[]"));

    let output = ddlkit(&["validate", broken.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
    let out = stdout(&output);
    assert!(out.contains("\"valid\":false"));
    assert!(out.contains("Bad"));

    let output = ddlkit(&["validate", garbage.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
    assert!(stdout(&output).is_empty());

    let missing = dir.join("missing.ddl");
    let output = ddlkit(&["validate", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_and_layout_describe_structs() {
    let dir = unique_temp_dir("layout");
    let file = write(&dir, "types.ddl", SCHEMA);
    let file = file.to_str().unwrap();

    let output = ddlkit(&["info", file]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"enums\":1"));
    assert!(out.contains("\"structs\":2"));
    assert!(out.contains("\"author\":\"cli tests\""));

    let output = ddlkit(&["layout", file, "Pos"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"serialized_size\":9"));
    assert!(out.contains("\"deserialized_size\":12"));
    assert!(out.contains("\"kind\":\"enum Mode (uint8)\""));

    let output = ddlkit(&["layout", file, "Missing"]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_prints_values_and_enum_names() {
    let dir = unique_temp_dir("decode");
    let file = write(&dir, "types.ddl", SCHEMA);
    let file = file.to_str().unwrap();

    let output = ddlkit(&["decode", file, "Pos", "--hex", "0a000000 f6ffffff 01"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("\"buffer_size\":9"));
    assert!(out.contains("{\"path\":\"x\",\"type\":\"int32\",\"value\":10}"));
    assert!(out.contains("\"value\":-10"));
    assert!(out.contains("\"symbol\":\"ON\""));

    let output = ddlkit(&["decode", file, "Pos", "--hex", "0a00"]);
    assert_eq!(output.status.code(), Some(60));

    let output = ddlkit(&["decode", file, "Pos", "--hex", "0a0"]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn convert_writes_other_language_versions() {
    let dir = unique_temp_dir("convert");
    let file = write(&dir, "types.ddl", SCHEMA);
    let target = dir.join("types-30.ddl");

    let output = ddlkit(&[
        "convert",
        file.to_str().unwrap(),
        "--to",
        "3.0",
        "--output",
        target.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("\"to\":\"3.0\""));

    let output = ddlkit(&["validate", target.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("\"language_version\":\"3.0\""));

    let output = ddlkit(&["convert", file.to_str().unwrap(), "--to", "9.9"]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn map_applies_samples_to_the_target() {
    let dir = unique_temp_dir("map");
    let ddl = write(&dir, "types.ddl", SCHEMA);
    let mapping = write(&dir, "mapping.xml", MAPPING);
    let ddl = ddl.to_str().unwrap();
    let mapping = mapping.to_str().unwrap();

    let output = ddlkit(&[
        "map",
        "--ddl",
        ddl,
        "--mapping",
        mapping,
        "--target",
        "out",
        "--source",
        "pos=0a000000f6ffffff01000000",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("\"transmissions\":1"));
    assert!(out.contains("\"value\":20.0"));
    assert!(out.contains("{\"path\":\"n\",\"type\":\"uint16\",\"value\":1}"));

    let output = ddlkit(&["map", "--ddl", ddl, "--mapping", mapping, "--target", "nope"]);
    assert_eq!(output.status.code(), Some(64));

    let output = ddlkit(&[
        "map", "--ddl", ddl, "--mapping", mapping, "--target", "out", "--source", "pos",
    ]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = ddlkit(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("ddlkit {}", env!("CARGO_PKG_VERSION"))
    );
}
