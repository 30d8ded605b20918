//! Container Module
//!
//! Building, reading and subsetting whole containers.
//!
//! ## Responsibilities
//! - CREATE: stream local files into a new container (`writer`)
//! - LOAD: bootstrap a reader from a source with two range reads (`reader`)
//! - COMPILE: copy a selection of items into a new container (`compiler`)
//! - Split large inputs into numbered parts and load them back (`parts`)
//!
//! Containers are write-once. Writers stream into a temporary sibling of the
//! destination and rename it into place only after the trailer is written, so
//! a failed or cancelled operation never leaves a loadable container behind.

mod compiler;
mod fetch;
mod parts;
mod reader;
mod writer;

use std::path::{Path, PathBuf};

use crate::format::{Index, ItemId, MetaValue, Metadata};

pub use compiler::{compile, CompilePlan};
pub use parts::{create_parts, group_by_size, load_parts, part_path};
pub use reader::ContainerReader;
pub use writer::{create, ContainerWriter};

/// What a finished CREATE or COMPILE produced
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Final path of the container
    pub path: PathBuf,
    /// The index as written to the footer
    pub index: Index,
    pub footer_offset: u64,
    pub footer_length: u64,
    /// Size of the whole file
    pub total_size: u64,
}

impl ContainerSummary {
    pub fn item_count(&self) -> usize {
        self.index.len()
    }

    pub fn data_length(&self) -> u64 {
        self.footer_offset
    }
}

/// One input file for CREATE, with optional id, name and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: PathBuf,
    /// Defaults to the input position
    pub id: Option<ItemId>,
    /// Defaults to the file name
    pub name: Option<String>,
    pub metadata: Metadata,
}

impl Sample {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            id: None,
            name: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name stored in the index for this sample
    pub fn item_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }
}

impl From<PathBuf> for Sample {
    fn from(path: PathBuf) -> Self {
        Sample::new(path)
    }
}

impl From<&Path> for Sample {
    fn from(path: &Path) -> Self {
        Sample::new(path)
    }
}

impl From<&str> for Sample {
    fn from(path: &str) -> Self {
        Sample::new(path)
    }
}
