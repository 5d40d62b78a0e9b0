//! Build configuration
//!
//! A build is described either by the positional argument list
//!
//! ```text
//! <folder> <output_h> <output_script> <output_bin>
//!     <partition_table> <partition_name> <increment> [<rule>...]
//! ```
//!
//! or by a TOML file:
//!
//! ```toml
//! source = "data"
//! header = "build/ffs_files.h"
//! script = "build/ffs_flash.mk"
//! image = "build/ffs.bin"
//! partition_table = "partitions.csv"
//! partition = "ffs"
//! increment = "0x1000"
//! rules = ["*.bin=p:storage,o:0x1000", "defaults.json=g:8192"]
//! ```
//!
//! Relative paths in a TOML file are resolved against the file's directory.

use crate::error::{PackError, Result};
use crate::validation::parse_int;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Usage text for the positional form
pub const USAGE: &str = "\
usage: ffs-pack <folder_name> <output_h_name> <output_script> <output_binary> \
<partition_table> <partition_name> <grow_size_boundary> \
[<glob>=[p:<partition_name>,o:<offset>|r:<raw_flash_offset>][[,]g:<growsize>|g:max][...]]
       ffs-pack --config <pack.toml> [<glob>=<directives>...]";

/// Everything a build needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Folder whose contents are packed
    pub source: PathBuf,

    /// C header output
    pub header: PathBuf,

    /// Load script output
    pub script: PathBuf,

    /// Packed image output
    pub image: PathBuf,

    /// ESP-IDF partition table CSV
    pub partition_table: PathBuf,

    /// Main partition name
    pub partition: String,

    /// Default allocation increment in bytes
    #[serde(deserialize_with = "deserialize_number")]
    pub increment: u64,

    /// Placement rules, in priority order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,

    /// Optional JSON build report output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
}

impl PackConfig {
    /// Number of required positional arguments
    pub const POSITIONAL_COUNT: usize = 7;

    /// Build a config from the positional argument list
    ///
    /// Arguments past the seventh are placement rules.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.len() < Self::POSITIONAL_COUNT {
            return Err(PackError::Usage(USAGE.to_string()));
        }

        let arg = |i: usize| args[i].as_ref();
        let config = PackConfig {
            source: PathBuf::from(arg(0)),
            header: PathBuf::from(arg(1)),
            script: PathBuf::from(arg(2)),
            image: PathBuf::from(arg(3)),
            partition_table: PathBuf::from(arg(4)),
            partition: arg(5).to_string(),
            increment: parse_int(arg(6))?,
            rules: args[Self::POSITIONAL_COUNT..]
                .iter()
                .map(|r| r.as_ref().to_string())
                .collect(),
            report: None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse TOML config text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PackConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file, resolving relative paths against its directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.source);
        resolve(&mut self.header);
        resolve(&mut self.script);
        resolve(&mut self.image);
        resolve(&mut self.partition_table);
        if let Some(report) = self.report.as_mut() {
            resolve(report);
        }
    }

    /// Check values that the type system does not
    pub fn validate(&self) -> Result<()> {
        if self.increment == 0 {
            return Err(PackError::Config(
                "allocation increment must be positive".to_string(),
            ));
        }
        if self.partition.trim().is_empty() {
            return Err(PackError::Config(
                "main partition name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accept either a TOML integer or a string with a radix prefix
fn deserialize_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(value) => Ok(value),
        Number::Text(text) => parse_int(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn positional() -> Vec<String> {
        ["data", "ffs_files.h", "flash.mk", "ffs.bin", "partitions.csv", "ffs", "0x1000"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_from_args() {
        let mut args = positional();
        args.push("*.bin=p:storage".to_string());
        args.push("a.txt=g:8192 b.txt=g:16".to_string());

        let config = PackConfig::from_args(&args).unwrap();
        assert_eq!(config.source, PathBuf::from("data"));
        assert_eq!(config.partition, "ffs");
        assert_eq!(config.increment, 4096);
        assert_eq!(config.rules.len(), 2);
        assert!(config.report.is_none());
    }

    #[test]
    fn test_wrong_count_is_usage() {
        let args = &positional()[..6];
        match PackConfig::from_args(args) {
            Err(PackError::Usage(text)) => assert!(text.starts_with("usage:")),
            other => panic!("expected usage error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_increment() {
        let mut args = positional();
        args[6] = "0".to_string();
        assert!(matches!(
            PackConfig::from_args(&args),
            Err(PackError::Config(_))
        ));

        args[6] = "big".to_string();
        assert!(matches!(
            PackConfig::from_args(&args),
            Err(PackError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
source = "data"
header = "out/ffs_files.h"
script = "out/flash.mk"
image = "out/ffs.bin"
partition_table = "partitions.csv"
partition = "ffs"
increment = "0x1000"
rules = ["*.bin=p:storage,o:0x1000"]
report = "out/report.json"
"#;
        let config = PackConfig::from_toml_str(text).unwrap();
        assert_eq!(config.increment, 4096);
        assert_eq!(config.rules, vec!["*.bin=p:storage,o:0x1000".to_string()]);
        assert_eq!(config.report, Some(PathBuf::from("out/report.json")));

        let numeric = text.replace("\"0x1000\"", "8192");
        assert_eq!(PackConfig::from_toml_str(&numeric).unwrap().increment, 8192);
    }

    #[test]
    fn test_toml_missing_field() {
        let result = PackConfig::from_toml_str("source = \"data\"\n");
        assert!(matches!(result, Err(PackError::ConfigFile(_))));
    }

    #[test]
    fn test_from_file_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pack.toml");
        std::fs::write(
            &path,
            "source = \"data\"\nheader = \"h\"\nscript = \"s\"\nimage = \"/abs/ffs.bin\"\n\
             partition_table = \"p.csv\"\npartition = \"ffs\"\nincrement = 4096\n",
        )
        .unwrap();

        let config = PackConfig::from_file(&path).unwrap();
        assert_eq!(config.source, dir.path().join("data"));
        assert_eq!(config.partition_table, dir.path().join("p.csv"));
        assert_eq!(config.image, PathBuf::from("/abs/ffs.bin"));
        assert!(config.rules.is_empty());
    }
}
