//! Shared test helpers
//!
//! - Scratch input files
//! - A wiremock file server that answers `Range` requests with slices of
//!   in-memory files and keeps every request it receives

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// =============================================================================
// Fixtures
// =============================================================================

/// Write one file per content into `dir`, named `file{i}.bin`
pub fn write_files(dir: &Path, contents: &[&[u8]]) -> Vec<PathBuf> {
    contents
        .iter()
        .enumerate()
        .map(|(i, data)| {
            let path = dir.join(format!("file{}.bin", i));
            fs::write(&path, data).unwrap();
            path
        })
        .collect()
}

/// Deterministic pseudo-random bytes
pub fn pattern_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u32).wrapping_mul(31).wrapping_add(seed as u32 * 7) % 251) as u8)
        .collect()
}

// =============================================================================
// HTTP Range Server
// =============================================================================

/// A logged request: method, path and raw Range header (if any)
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    pub range: Option<String>,
}

/// How the server treats the `Range` header
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeMode {
    /// 206 with the requested slice
    Honor,
    /// 200 with the full body
    Ignore,
    /// 206 for `bytes=a-b`, but the slice (and its Content-Range) starts one
    /// byte late. Suffix ranges are served correctly.
    Shifted,
}

/// Serves in-memory files over HTTP on 127.0.0.1.
///
/// wiremock runs its listener on a thread of its own; `runtime` only drives
/// setup and request inspection, so blocking clients can be used from the
/// test thread.
pub struct RangeServer {
    server: Option<MockServer>,
    runtime: Runtime,
    /// Requests before this index were dropped by `reset`
    baseline: AtomicUsize,
}

impl RangeServer {
    /// Serve `files` (URL path without leading slash → bytes) with range support
    pub fn start(files: HashMap<String, Vec<u8>>) -> Self {
        Self::start_with(files, RangeMode::Honor)
    }

    /// Serve `files`, ignoring `Range` headers (always 200 + full body)
    pub fn start_without_ranges(files: HashMap<String, Vec<u8>>) -> Self {
        Self::start_with(files, RangeMode::Ignore)
    }

    /// Serve a single file as `/<name>`
    pub fn single(name: &str, data: Vec<u8>) -> Self {
        let mut files = HashMap::new();
        files.insert(name.to_string(), data);
        Self::start(files)
    }

    pub fn start_with(files: HashMap<String, Vec<u8>>, mode: RangeMode) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            for (name, data) in files {
                // Unmatched paths fall through to wiremock's 404
                Mock::given(method("GET"))
                    .and(path(format!("/{}", name)))
                    .respond_with(RangeResponder {
                        data: Arc::new(data),
                        mode,
                    })
                    .mount(&server)
                    .await;
            }
            server
        });

        Self {
            server: Some(server),
            runtime,
            baseline: AtomicUsize::new(0),
        }
    }

    fn server(&self) -> &MockServer {
        self.server.as_ref().unwrap()
    }

    /// URL of a served file
    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.server().uri(), name)
    }

    /// Number of requests received since the last `reset`
    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Requests received since the last `reset`, oldest first
    pub fn requests(&self) -> Vec<LoggedRequest> {
        let skip = self.baseline.load(Ordering::SeqCst);
        self.received()
            .iter()
            .skip(skip)
            .map(|request| LoggedRequest {
                method: request.method.to_string(),
                path: request.url.path().trim_start_matches('/').to_string(),
                range: range_header(request),
            })
            .collect()
    }

    /// Forget all requests received so far
    pub fn reset(&self) {
        self.baseline.store(self.received().len(), Ordering::SeqCst);
    }

    fn received(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server().received_requests())
            .unwrap_or_default()
    }
}

impl Drop for RangeServer {
    fn drop(&mut self) {
        // Hand the server back to wiremock's pool inside the runtime
        let _guard = self.runtime.enter();
        self.server.take();
    }
}

/// Answers GETs for one file according to its `RangeMode`
struct RangeResponder {
    data: Arc<Vec<u8>>,
    mode: RangeMode,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.data.len() as u64;
        let range = match self.mode {
            RangeMode::Ignore => None,
            _ => range_header(request).and_then(|value| parse_range(&value)),
        };

        let (start, end) = match range {
            None => return ResponseTemplate::new(200).set_body_bytes(self.data.to_vec()),
            Some(ByteRange::Suffix(n)) if n == 0 || total == 0 => return not_satisfiable(total),
            Some(ByteRange::Suffix(n)) => (total - n.min(total), total - 1),
            Some(ByteRange::Bounded(start, end)) => match self.mode {
                RangeMode::Shifted => (start + 1, end.saturating_add(1)),
                _ => (start, end),
            },
        };
        if start >= total || end < start {
            return not_satisfiable(total);
        }
        let end = end.min(total - 1);

        ResponseTemplate::new(206)
            .insert_header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
            .insert_header("Accept-Ranges", "bytes")
            .set_body_bytes(self.data[start as usize..=end as usize].to_vec())
    }
}

fn not_satisfiable(total: u64) -> ResponseTemplate {
    ResponseTemplate::new(416).insert_header("Content-Range", format!("bytes */{}", total))
}

fn range_header(request: &Request) -> Option<String> {
    request
        .headers
        .get("range")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

enum ByteRange {
    /// `bytes=a-b`
    Bounded(u64, u64),
    /// `bytes=-n`
    Suffix(u64),
}

fn parse_range(value: &str) -> Option<ByteRange> {
    let bounds = value.trim().strip_prefix("bytes=")?;
    let (a, b) = bounds.split_once('-')?;
    if a.trim().is_empty() {
        return Some(ByteRange::Suffix(b.trim().parse().ok()?));
    }
    Some(ByteRange::Bounded(a.trim().parse().ok()?, b.trim().parse().ok()?))
}
