//! Command line behavior and exit codes

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const PARTITIONS: &str = "\
nvs,     data, nvs,    0x9000,  0x6000,
ffs,     data, spiffs, 0x10000, 0x4000,
storage, data, fat,    0x14000, 0x4000,
";

fn setup(files: &[(&str, usize)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("data")).unwrap();
    for (name, len) in files {
        fs::write(dir.path().join("data").join(name), vec![7u8; *len]).unwrap();
    }
    fs::write(dir.path().join("partitions.csv"), PARTITIONS).unwrap();
    dir
}

fn positional(dir: &Path) -> Vec<String> {
    ["data", "ffs_files.h", "flash.mk", "ffs.bin", "partitions.csv"]
        .iter()
        .map(|name| dir.join(name).display().to_string())
        .chain(["ffs".to_string(), "0x1000".to_string()])
        .collect()
}

fn ffs_pack(args: &[String]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ffs-pack"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_positional_build_succeeds() {
    let dir = setup(&[("a.txt", 10), ("b.bin", 20)]);
    let mut args = positional(dir.path());
    args.push("*.bin=p:storage".to_string());

    let out = ffs_pack(&args);
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("FFS files found: [\"/a.txt\", \"/b.bin\"]"));
    assert_eq!(fs::metadata(dir.path().join("ffs.bin")).unwrap().len(), 0x4000);
}

#[test]
fn test_too_few_arguments_prints_usage() {
    let out = ffs_pack(&["data".to_string()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr).unwrap().contains("usage:"));
}

#[test]
fn test_overflow_exit_code() {
    let dir = setup(&[("big.dat", 0x5000)]);
    let out = ffs_pack(&positional(dir.path()));
    assert_eq!(out.status.code(), Some(3));
    assert!(!dir.path().join("ffs.bin").exists());
}

#[test]
fn test_missing_partition_exit_code() {
    let dir = setup(&[("a.txt", 1)]);
    let mut args = positional(dir.path());
    args[5] = "nope".to_string();

    let out = ffs_pack(&args);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr).unwrap().contains("nope"));
}

#[test]
fn test_config_file_with_report() {
    let dir = setup(&[("a.txt", 3)]);
    fs::write(
        dir.path().join("pack.toml"),
        "source = \"data\"\nheader = \"ffs_files.h\"\nscript = \"flash.mk\"\nimage = \"ffs.bin\"\n\
         partition_table = \"partitions.csv\"\npartition = \"ffs\"\nincrement = \"0x1000\"\n",
    )
    .unwrap();

    let out = ffs_pack(&[
        "--config".to_string(),
        dir.path().join("pack.toml").display().to_string(),
        "--report".to_string(),
        dir.path().join("report.json").display().to_string(),
    ]);
    assert!(out.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["free"], 0x3000);
}
