//! Compiler
//!
//! Builds a new container from a selection of another container's items.
//!
//! The output layout is computed before any byte is copied: selection order
//! becomes item order and offsets are assigned back to back. Source reads
//! run in parallel; writes land sequentially at the precomputed offsets.

use std::collections::HashSet;
use std::path::Path;

use crate::config::{Config, IdPolicy};
use crate::error::{Result, TortillaError};
use crate::format::{Index, Item, ItemId, ItemRef};
use crate::source::Locator;

use super::fetch::{chunk_range, fetch_ordered, RangeJob};
use super::{ContainerReader, ContainerSummary, ContainerWriter};

/// Output layout and source read plan for one compile
#[derive(Debug, Clone)]
pub struct CompilePlan {
    /// Items of the new container, with fresh offsets
    items: Vec<Item>,
    /// Source ranges to read, merged where selections are byte-adjacent
    spans: Vec<RangeJob>,
}

impl CompilePlan {
    /// Resolve `selection` against `index` and lay out the output
    pub fn new(index: &Index, selection: &[ItemRef], policy: IdPolicy) -> Result<Self> {
        if selection.is_empty() {
            return Err(TortillaError::EmptySelection);
        }

        let sources = selection
            .iter()
            .map(|r| index.get(r))
            .collect::<Result<Vec<_>>>()?;

        if policy == IdPolicy::Preserve {
            let mut seen = HashSet::with_capacity(sources.len());
            for item in &sources {
                if !seen.insert(&item.id) {
                    return Err(TortillaError::DuplicateItemId(item.id.to_string()));
                }
            }
        }

        let mut items = Vec::with_capacity(sources.len());
        let mut spans: Vec<RangeJob> = Vec::new();
        let mut offset = 0u64;

        for (pos, src) in sources.iter().enumerate() {
            let id = match policy {
                IdPolicy::Renumber => ItemId::Int(pos as u64),
                IdPolicy::Preserve => src.id.clone(),
            };
            items.push(Item {
                id,
                name: src.name.clone(),
                offset,
                length: src.length,
                metadata: src.metadata.clone(),
            });
            offset += src.length;

            if src.length == 0 {
                continue;
            }
            match spans.last_mut() {
                Some(last) if last.offset + last.length == src.offset => {
                    last.length += src.length;
                }
                _ => spans.push(RangeJob {
                    offset: src.offset,
                    length: src.length,
                }),
            }
        }

        Ok(Self { items, spans })
    }

    /// Items of the output container
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Merged source ranges as `(offset, length)`
    pub fn spans(&self) -> Vec<(u64, u64)> {
        self.spans.iter().map(|s| (s.offset, s.length)).collect()
    }

    /// Total bytes of the output data region
    pub fn data_length(&self) -> u64 {
        self.items.iter().map(|i| i.length).sum()
    }
}

/// Copy the selected items of `source` into a new container at `output`.
///
/// Item metadata and names are carried over verbatim; ids follow
/// `config.id_policy`. The source is only read.
pub fn compile(
    source: &ContainerReader,
    selection: &[ItemRef],
    output: &Path,
    config: &Config,
) -> Result<ContainerSummary> {
    let plan = CompilePlan::new(source.index(), selection, config.id_policy)?;
    ensure_not_source(source, output)?;

    let mut jobs = Vec::new();
    for span in &plan.spans {
        chunk_range(span.offset, span.length, config.copy_chunk_size as u64, &mut jobs);
    }

    tracing::info!(
        "Compiling {} of {} items from {} into {} ({} range reads)",
        plan.items.len(),
        source.len(),
        source.locator(),
        output.display(),
        jobs.len()
    );

    let mut writer = ContainerWriter::create(output, config)?;
    writer.set_file_format(source.file_format())?;

    let mut pending = plan.items.into_iter().peekable();
    let mut commit_ready = |writer: &mut ContainerWriter| -> Result<()> {
        while let Some(next) = pending.peek() {
            if next.end() > writer.data_length() {
                break;
            }
            if let Some(item) = pending.next() {
                writer.commit_item(item.id, item.name, item.length, item.metadata)?;
            }
        }
        Ok(())
    };

    fetch_ordered(source.source(), &jobs, config, |_, bytes| {
        writer.write_data(&bytes)?;
        commit_ready(&mut writer)
    })?;
    commit_ready(&mut writer)?;

    if writer.item_count() != selection.len() {
        return Err(TortillaError::Transport(format!(
            "copied {} bytes but {} of {} items are incomplete",
            writer.data_length(),
            selection.len() - writer.item_count(),
            selection.len()
        )));
    }

    writer.finish()
}

/// Refuse to overwrite the container being read
fn ensure_not_source(source: &ContainerReader, output: &Path) -> Result<()> {
    if let Locator::Local(src) = Locator::parse(source.locator()) {
        if let (Ok(a), Ok(b)) = (src.canonicalize(), output.canonicalize()) {
            if a == b {
                return Err(TortillaError::Config(format!(
                    "Output {} is the source container",
                    output.display()
                )));
            }
        }
    }
    Ok(())
}
