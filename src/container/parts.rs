//! Multi-part containers
//!
//! Large inputs can be split into several self-contained containers named
//! `<stem>.0000.part.tortilla`, `<stem>.0001.part.tortilla`, ... Each part's
//! footer records its part number and the part count, so the set can be
//! rediscovered from part 0 alone.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, TortillaError};
use crate::format::ItemId;

use super::writer::prepare_samples;
use super::{ContainerReader, ContainerSummary, ContainerWriter, Sample};

/// Suffix that turns a locator into a multi-part pattern
const PART_PATTERN_SUFFIX: &str = "*.tortilla";

/// Path of part `part` for a container requested at `output`
///
/// `out/data.tortilla` → `out/data.0003.part.tortilla`
pub fn part_path(output: &Path, part: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{}.{:04}.part.tortilla", stem, part))
}

/// Greedily group consecutive lengths so each group sums to at most `max`.
///
/// A single length above `max` gets a group of its own.
pub fn group_by_size(lengths: &[u64], max: u64) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut sum = 0u64;

    for (i, &len) in lengths.iter().enumerate() {
        if i > start && sum + len > max {
            groups.push(start..i);
            start = i;
            sum = 0;
        }
        sum += len;
    }
    if start < lengths.len() {
        groups.push(start..lengths.len());
    }
    groups
}

/// CREATE, split into parts of at most `config.max_part_size` data bytes.
///
/// Without a size limit, or when everything fits, a single container is
/// written at `output` itself. If any part fails, parts already written are
/// removed again.
pub fn create_parts(
    samples: &[Sample],
    output: &Path,
    config: &Config,
) -> Result<Vec<ContainerSummary>> {
    let ids = prepare_samples(samples)?;

    let lengths = samples
        .iter()
        .map(|s| fs::metadata(&s.path).map(|m| m.len()))
        .collect::<std::io::Result<Vec<_>>>()?;

    let groups = match config.max_part_size {
        Some(max) => group_by_size(&lengths, max),
        None => vec![0..samples.len()],
    };

    if groups.len() <= 1 {
        return super::create(samples, output, config).map(|s| vec![s]);
    }

    let part_count = u32::try_from(groups.len())
        .map_err(|_| TortillaError::Config(format!("Too many parts: {}", groups.len())))?;

    tracing::info!(
        "Creating {} parts for {} files at {}",
        part_count,
        samples.len(),
        output.display()
    );

    let mut written: Vec<ContainerSummary> = Vec::with_capacity(groups.len());
    for (part, range) in groups.into_iter().enumerate() {
        let result = write_part(
            &samples[range.clone()],
            &ids[range],
            &part_path(output, part),
            part as u32,
            part_count,
            config,
        );
        match result {
            Ok(summary) => written.push(summary),
            Err(e) => {
                for summary in &written {
                    if let Err(rm) = fs::remove_file(&summary.path) {
                        tracing::warn!("Failed to remove part {}: {}", summary.path.display(), rm);
                    }
                }
                return Err(e);
            }
        }
    }

    Ok(written)
}

fn write_part(
    samples: &[Sample],
    ids: &[ItemId],
    path: &Path,
    part_index: u32,
    part_count: u32,
    config: &Config,
) -> Result<ContainerSummary> {
    let mut writer = ContainerWriter::create(path, config)?;
    writer.set_part(part_index, part_count)?;
    for (sample, id) in samples.iter().zip(ids) {
        let sample = Sample {
            id: Some(id.clone()),
            ..sample.clone()
        };
        writer.add_file(&sample)?;
    }
    writer.finish()
}

/// Load a container or a set of parts.
///
/// `data*.tortilla` (a path or URL) expands to `data.0000.part.tortilla`
/// and its siblings; the part count is read from part 0. Any other locator
/// loads as a single container.
pub fn load_parts(locator: &str, config: &Config) -> Result<Vec<ContainerReader>> {
    let prefix = match locator.strip_suffix(PART_PATTERN_SUFFIX) {
        Some(prefix) => prefix,
        None => return Ok(vec![ContainerReader::load_with_config(locator, config)?]),
    };

    let first = ContainerReader::load_with_config(&format!("{}.0000.part.tortilla", prefix), config)?;
    let part_count = first.index().part_count();
    check_part(&first, 0, part_count)?;

    let mut readers = Vec::with_capacity(part_count as usize);
    readers.push(first);
    for part in 1..part_count {
        let reader = ContainerReader::load_with_config(
            &format!("{}.{:04}.part.tortilla", prefix, part),
            config,
        )?;
        check_part(&reader, part, part_count)?;
        readers.push(reader);
    }

    tracing::debug!("Loaded {} parts for {}", readers.len(), locator);
    Ok(readers)
}

fn check_part(reader: &ContainerReader, expected: u32, count: u32) -> Result<()> {
    let index = reader.index();
    if index.part_index() != expected || index.part_count() != count {
        return Err(TortillaError::CorruptIndex(format!(
            "{} claims to be part {} of {}, expected part {} of {}",
            reader.locator(),
            index.part_index(),
            index.part_count(),
            expected,
            count
        )));
    }
    Ok(())
}
