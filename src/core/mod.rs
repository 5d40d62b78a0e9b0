//! Packing core
//!
//! - [`partition`] - Partition records and the CSV table reader
//! - [`input`] - Sorted discovery of the files to pack
//! - [`pattern`] / [`rule`] - Glob patterns and placement overrides
//! - [`placement`] - Placement resolution over the default policy
//! - [`allocator`] - Cursor and capacity accounting ([`allocator::BuildState`])
//! - [`sink`] - The three output sink traits
//! - [`manifest`], [`script`], [`image`] - Sink implementations
//! - [`layout`] - The single pass tying it all together

pub mod allocator;
pub mod image;
pub mod input;
pub mod layout;
pub mod manifest;
pub mod partition;
pub mod pattern;
pub mod placement;
pub mod rule;
pub mod script;
pub mod sink;
pub mod validation;
