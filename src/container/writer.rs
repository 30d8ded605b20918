//! Container Writer
//!
//! Streams item bytes into a new container, then appends footer and trailer.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{CancelToken, Config};
use crate::error::{Result, TortillaError};
use crate::format::{encode_index, Index, Item, ItemId, Metadata, Trailer, FILE_FORMAT_LEN};

use super::{ContainerSummary, Sample};

/// Builder for a single container file.
///
/// Call `add_file()` / `add_bytes()` in the desired item order, then
/// `finish()`. Dropping the writer without finishing discards the output.
#[derive(Debug)]
pub struct ContainerWriter {
    /// Final destination
    output: PathBuf,
    /// Where bytes are written until `finish()` renames it
    temp_path: PathBuf,
    /// Buffered writer; taken by `finish()`
    writer: Option<BufWriter<File>>,
    /// Recorded items, in index order
    items: Vec<Item>,
    ids: HashSet<ItemId>,
    /// Bytes of the data region written so far
    written: u64,
    /// Bytes of the data region claimed by recorded items
    committed: u64,
    file_format: String,
    part_index: u32,
    part_count: u32,
    chunk_size: usize,
    cancel: CancelToken,
}

impl ContainerWriter {
    /// Start a new container at `output` (created or overwritten on finish)
    pub fn create(output: &Path, config: &Config) -> Result<Self> {
        check_file_format(&config.file_format)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = temp_path_for(output);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        tracing::debug!(
            "Writing container {} via {}",
            output.display(),
            temp_path.display()
        );

        Ok(Self {
            output: output.to_path_buf(),
            temp_path,
            writer: Some(BufWriter::new(file)),
            items: Vec::new(),
            ids: HashSet::new(),
            written: 0,
            committed: 0,
            file_format: config.file_format.clone(),
            part_index: 0,
            part_count: 1,
            chunk_size: config.copy_chunk_size.max(1),
            cancel: config.cancel.clone(),
        })
    }

    /// Override the data format tag
    pub fn set_file_format(&mut self, format: impl Into<String>) -> Result<()> {
        let format = format.into();
        check_file_format(&format)?;
        self.file_format = format;
        Ok(())
    }

    /// Mark this container as part `part_index` of `part_count`
    pub fn set_part(&mut self, part_index: u32, part_count: u32) -> Result<()> {
        if part_count == 0 || part_index >= part_count {
            return Err(TortillaError::Config(format!(
                "Invalid part {} of {}",
                part_index, part_count
            )));
        }
        self.part_index = part_index;
        self.part_count = part_count;
        Ok(())
    }

    /// Stream a local file in as the next item
    pub fn add_file(&mut self, sample: &Sample) -> Result<&Item> {
        self.cancel.check()?;
        let id = self.claim_id(sample.id.clone())?;

        let mut file = File::open(&sample.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TortillaError::FileNotFound(sample.path.clone()),
            _ => TortillaError::Io(e),
        })?;

        let start = self.written;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write_data(&buf[..n])?;
        }

        let length = self.written - start;
        self.commit_item(id, sample.item_name(), length, sample.metadata.clone())
    }

    /// Append in-memory bytes as the next item
    pub fn add_bytes(
        &mut self,
        id: Option<ItemId>,
        name: impl Into<String>,
        metadata: Metadata,
        data: &[u8],
    ) -> Result<&Item> {
        self.cancel.check()?;
        let id = self.claim_id(id)?;
        self.write_data(data)?;
        self.commit_item(id, name.into(), data.len() as u64, metadata)
    }

    /// Reserve an id for the next item (defaults to the item position)
    pub(crate) fn claim_id(&mut self, requested: Option<ItemId>) -> Result<ItemId> {
        let id = requested.unwrap_or(ItemId::Int(self.items.len() as u64));
        if self.ids.contains(&id) {
            return Err(TortillaError::DuplicateItemId(id.to_string()));
        }
        Ok(id)
    }

    /// Append raw bytes to the data region
    pub(crate) fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            TortillaError::Io(io::Error::new(ErrorKind::Other, "container writer already closed"))
        })?;
        writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Record the next `length` written bytes as an item
    pub(crate) fn commit_item(
        &mut self,
        id: ItemId,
        name: String,
        length: u64,
        metadata: Metadata,
    ) -> Result<&Item> {
        if self.committed + length > self.written {
            return Err(TortillaError::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "item {} claims {} bytes but only {} are uncommitted",
                    id,
                    length,
                    self.written - self.committed
                ),
            )));
        }
        if !self.ids.insert(id.clone()) {
            return Err(TortillaError::DuplicateItemId(id.to_string()));
        }

        self.items.push(Item {
            id,
            name,
            offset: self.committed,
            length,
            metadata,
        });
        self.committed += length;

        let idx = self.items.len() - 1;
        Ok(&self.items[idx])
    }

    /// Number of items recorded so far
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Bytes of the data region written so far
    pub fn data_length(&self) -> u64 {
        self.written
    }

    /// Finish: write footer and trailer, sync, and move into place
    pub fn finish(mut self) -> Result<ContainerSummary> {
        self.cancel.check()?;

        if self.committed != self.written {
            return Err(TortillaError::Io(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{} bytes written but only {} belong to items",
                    self.written, self.committed
                ),
            )));
        }

        let index = Index::new(std::mem::take(&mut self.items))?
            .with_file_format(self.file_format.clone())
            .with_part(self.part_index, self.part_count);

        let footer = encode_index(&index)?;
        let footer_offset = self.written;
        let footer_length = footer.len() as u64;
        let trailer = Trailer::new(index.len() as u32, footer_offset, footer_length);

        let mut writer = self.writer.take().ok_or_else(|| {
            TortillaError::Io(io::Error::new(ErrorKind::Other, "container writer already closed"))
        })?;
        writer.write_all(&footer)?;
        writer.write_all(&trailer.encode())?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| TortillaError::Io(io::Error::new(ErrorKind::Other, e.to_string())))?;
        file.sync_all()?;
        let total_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.temp_path, &self.output)?;

        tracing::info!(
            "Wrote container {} ({} items, {} data bytes, {} footer bytes)",
            self.output.display(),
            index.len(),
            footer_offset,
            footer_length
        );

        Ok(ContainerSummary {
            path: self.output.clone(),
            index,
            footer_offset,
            footer_length,
            total_size,
        })
    }

    /// Discard the partial output explicitly
    pub fn abandon(self) {
        // Drop removes the temporary file
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        // Close the handle before removing the file
        self.writer.take();
        if self.temp_path.exists() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                tracing::warn!(
                    "Failed to remove partial container {}: {}",
                    self.temp_path.display(),
                    e
                );
            } else {
                tracing::debug!("Discarded partial container {}", self.temp_path.display());
            }
        }
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Pack `samples` into one container at `output`.
///
/// Inputs are checked (existence, unique ids) before anything is written.
/// Items get ids `0, 1, 2, ...` by input order unless a sample names its own.
pub fn create(samples: &[Sample], output: &Path, config: &Config) -> Result<ContainerSummary> {
    let ids = prepare_samples(samples)?;

    tracing::info!(
        "Creating container {} from {} files",
        output.display(),
        samples.len()
    );

    let mut writer = ContainerWriter::create(output, config)?;
    for (sample, id) in samples.iter().zip(ids) {
        let sample = Sample {
            id: Some(id),
            ..sample.clone()
        };
        writer.add_file(&sample)?;
    }
    writer.finish()
}

/// Check every input exists and resolve ids; returns ids in input order
pub(crate) fn prepare_samples(samples: &[Sample]) -> Result<Vec<ItemId>> {
    let mut seen = HashSet::with_capacity(samples.len());
    let mut ids = Vec::with_capacity(samples.len());

    for (pos, sample) in samples.iter().enumerate() {
        let meta = fs::metadata(&sample.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TortillaError::FileNotFound(sample.path.clone()),
            _ => TortillaError::Io(e),
        })?;
        if !meta.is_file() {
            return Err(TortillaError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a regular file", sample.path.display()),
            )));
        }

        let id = sample.id.clone().unwrap_or(ItemId::Int(pos as u64));
        if !seen.insert(id.clone()) {
            return Err(TortillaError::DuplicateItemId(id.to_string()));
        }
        ids.push(id);
    }

    Ok(ids)
}

fn check_file_format(format: &str) -> Result<()> {
    if format.len() > FILE_FORMAT_LEN || format.as_bytes().contains(&0) {
        return Err(TortillaError::Config(format!(
            "File format tag '{}' must be at most {} bytes without NULs",
            format, FILE_FORMAT_LEN
        )));
    }
    Ok(())
}

/// Hidden sibling used while the container is incomplete
fn temp_path_for(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());
    output.with_file_name(format!(".{}.{}.partial", name, std::process::id()))
}
