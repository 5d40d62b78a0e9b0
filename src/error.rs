//! Error types for image packing

use thiserror::Error;

/// Packing result type
pub type Result<T> = std::result::Result<T, PackError>;

/// Broad classification of a [`PackError`]
///
/// Config and lookup errors are user-fixable before a build runs. Capacity
/// errors mean the inputs do not fit the partition layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Lookup,
    Capacity,
    Io,
}

/// Packing errors
#[derive(Error, Debug)]
pub enum PackError {
    /// Wrong number of positional arguments
    #[error("{0}")]
    Usage(String),

    /// Malformed placement rule expression
    #[error("Invalid placement rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// Numeric argument that is not decimal, 0x, 0o or 0b
    #[error("Invalid number: '{0}'")]
    InvalidNumber(String),

    /// Malformed partition table line
    #[error("Partition table line {line}: {reason}")]
    PartitionTable { line: usize, reason: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two input paths collapse into the same manifest identifier
    #[error("Files '{first}' and '{second}' both map to identifier '{ident}'")]
    DuplicateIdentifier {
        ident: String,
        first: String,
        second: String,
    },

    /// Named partition is not in the table
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// Allocation does not fit its destination partition
    #[error(
        "Partition overflow in '{partition}': '{file}' needs {overflow} bytes past its {capacity}"
    )]
    PartitionOverflow {
        partition: String,
        file: String,
        capacity: u64,
        overflow: u64,
    },

    /// Two files claim the same bytes of one partition
    #[error(
        "Region 0x{start:x}..0x{end:x} of '{partition}' for '{file}' overlaps '{other}'"
    )]
    RegionOverlap {
        partition: String,
        file: String,
        other: String,
        start: u64,
        end: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file parse error
    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
}

impl PackError {
    pub(crate) fn rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        PackError::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackError::Usage(_)
            | PackError::InvalidRule { .. }
            | PackError::InvalidNumber(_)
            | PackError::PartitionTable { .. }
            | PackError::Config(_)
            | PackError::DuplicateIdentifier { .. }
            | PackError::ConfigFile(_) => ErrorKind::Config,
            PackError::PartitionNotFound(_) => ErrorKind::Lookup,
            PackError::PartitionOverflow { .. } | PackError::RegionOverlap { .. } => {
                ErrorKind::Capacity
            }
            PackError::Io(_) | PackError::Serialization(_) => ErrorKind::Io,
        }
    }

    /// True for errors the user can fix before running a build
    pub fn is_config_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config | ErrorKind::Lookup)
    }

    pub fn is_capacity_error(&self) -> bool {
        self.kind() == ErrorKind::Capacity
    }
}
