//! Ordered range fetch
//!
//! Reads a list of byte ranges through a small worker pool and hands the
//! results to a sink strictly in list order, whatever order the reads
//! complete in. At most `2 * workers` ranges are in flight or buffered.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use crossbeam::channel;

use crate::config::Config;
use crate::error::{Result, TortillaError};
use crate::source::ByteRangeSource;

/// One range to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RangeJob {
    pub offset: u64,
    pub length: u64,
}

/// Read every job and call `sink(seq, bytes)` in job order.
///
/// Cancellation is checked before each result is consumed.
pub(crate) fn fetch_ordered<F>(
    source: &dyn ByteRangeSource,
    jobs: &[RangeJob],
    config: &Config,
    mut sink: F,
) -> Result<()>
where
    F: FnMut(usize, Bytes) -> Result<()>,
{
    let workers = config.workers.max(1).min(jobs.len());

    if workers <= 1 {
        for (seq, job) in jobs.iter().enumerate() {
            config.cancel.check()?;
            let bytes = source.read_range(job.offset, job.length)?;
            sink(seq, bytes)?;
        }
        return Ok(());
    }

    let window = workers * 2;
    let stop = AtomicBool::new(false);

    let outcome = crossbeam::thread::scope(|s| {
        let (job_tx, job_rx) = channel::bounded::<(usize, RangeJob)>(window);
        let (res_tx, res_rx) = channel::unbounded::<(usize, Result<Bytes>)>();

        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            let stop = &stop;
            s.spawn(move |_| {
                for (seq, job) in job_rx.iter() {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let result = source.read_range(job.offset, job.length);
                    if res_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(res_tx);

        let mut run = || -> Result<()> {
            let mut pending: BTreeMap<usize, Bytes> = BTreeMap::new();
            let mut next_dispatch = 0;
            let mut next_write = 0;

            while next_write < jobs.len() {
                config.cancel.check()?;

                while next_dispatch < jobs.len() && next_dispatch < next_write + window {
                    job_tx
                        .send((next_dispatch, jobs[next_dispatch]))
                        .map_err(|_| TortillaError::Worker("fetch workers exited".to_string()))?;
                    next_dispatch += 1;
                }

                let (seq, result) = res_rx
                    .recv()
                    .map_err(|_| TortillaError::Worker("fetch workers exited".to_string()))?;
                pending.insert(seq, result?);

                while let Some(bytes) = pending.remove(&next_write) {
                    sink(next_write, bytes)?;
                    next_write += 1;
                }
            }
            Ok(())
        };

        let result = run();
        if result.is_err() {
            stop.store(true, Ordering::Relaxed);
        }
        drop(job_tx);
        result
    });

    outcome.map_err(|_| TortillaError::Worker("range fetch worker panicked".to_string()))?
}

/// Split `[offset, offset + length)` into jobs of at most `chunk` bytes
pub(crate) fn chunk_range(offset: u64, length: u64, chunk: u64, out: &mut Vec<RangeJob>) {
    let chunk = chunk.max(1);
    let mut pos = offset;
    let end = offset + length;
    while pos < end {
        let len = chunk.min(end - pos);
        out.push(RangeJob {
            offset: pos,
            length: len,
        });
        pos += len;
    }
}
