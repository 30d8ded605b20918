//! HTTP source
//!
//! Ranged reads over HTTP(S) using `Range` requests. The server must answer
//! `206 Partial Content` with a `Content-Range` that starts where the request
//! did; a `200 OK` to a ranged request means the server ignored the range and
//! is reported as `RangeUnsupported`, never followed by a full-body download.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::{Result, TortillaError};
use crate::format::TRAILER_SIZE;

use super::{check_bounds, ByteRangeSource};

/// Byte-range source backed by an HTTP(S) endpoint
#[derive(Debug)]
pub struct HttpSource {
    client: Client,
    url: String,
    size: u64,
    /// Last bytes of the resource, fetched while opening
    tail: Bytes,
}

impl HttpSource {
    /// Open a remote source.
    ///
    /// Issues one suffix request (`Range: bytes=-30`) that verifies range
    /// support, learns the total size from `Content-Range` and keeps the
    /// returned bytes. Reads inside that tail (the trailer) are then served
    /// without another request.
    pub fn open(url: &str, config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|e| TortillaError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(url)
            .header(RANGE, format!("bytes=-{}", TRAILER_SIZE))
            .send()
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        let (size, tail) = match status {
            StatusCode::PARTIAL_CONTENT => read_tail(url, response)?,
            // Nothing to suffix: the resource is empty
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let size = content_range_total(&response).ok_or_else(|| {
                    TortillaError::Transport(format!(
                        "{} returned {} without a usable Content-Range total",
                        url, status
                    ))
                })?;
                (size, Bytes::new())
            }
            StatusCode::OK => {
                tracing::warn!("Server for {} ignored the Range header", url);
                return Err(TortillaError::RangeUnsupported(url.to_string()));
            }
            s => return Err(status_error(url, s)),
        };

        tracing::debug!(
            "Opened remote source {} ({} bytes, {} cached at the end)",
            url,
            size,
            tail.len()
        );

        Ok(Self {
            client,
            url: url.to_string(),
            size,
            tail,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn tail_start(&self) -> u64 {
        self.size - self.tail.len() as u64
    }
}

impl ByteRangeSource for HttpSource {
    fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        check_bounds(offset, length, self.size)?;
        if length == 0 {
            return Ok(Bytes::new());
        }

        let tail_start = self.tail_start();
        if offset >= tail_start {
            let from = (offset - tail_start) as usize;
            return Ok(self.tail.slice(from..from + length as usize));
        }

        let last = offset + length - 1;
        tracing::trace!("GET {} bytes={}-{}", self.url, offset, last);

        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-{}", offset, last))
            .send()
            .map_err(|e| transport_error(&self.url, e))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK => return Err(TortillaError::RangeUnsupported(self.url.clone())),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(TortillaError::OutOfBounds {
                    offset,
                    length,
                    size: content_range_total(&response).unwrap_or(self.size),
                })
            }
            s => return Err(status_error(&self.url, s)),
        }

        match content_range_bounds(&response) {
            Some((start, _)) if start == offset => {}
            Some((start, end)) => {
                return Err(TortillaError::Transport(format!(
                    "Misplaced range from {}: asked for bytes {}-{}, got {}-{}",
                    self.url, offset, last, start, end
                )))
            }
            None => {
                return Err(TortillaError::Transport(format!(
                    "Partial response from {} without a usable Content-Range",
                    self.url
                )))
            }
        }

        let body = response.bytes().map_err(|e| {
            TortillaError::Transport(format!("Failed to read response body from {}: {}", self.url, e))
        })?;

        if body.len() as u64 != length {
            return Err(TortillaError::Transport(format!(
                "Short range read from {}: wanted {} bytes at {}, got {}",
                self.url,
                length,
                offset,
                body.len()
            )));
        }

        Ok(body)
    }

    fn total_size(&self) -> u64 {
        self.size
    }

    fn locator(&self) -> &str {
        &self.url
    }
}

/// Size and tail bytes from a 206 answer to the suffix request.
///
/// The range must end at the last byte and the body must fill it.
fn read_tail(url: &str, response: Response) -> Result<(u64, Bytes)> {
    let bounds = content_range_bounds(&response);
    let total = content_range_total(&response);
    let (start, end, size) = match (bounds, total) {
        (Some((start, end)), Some(size)) if end + 1 == size => (start, end, size),
        _ => {
            return Err(TortillaError::Transport(format!(
                "{} answered the tail request without a usable Content-Range",
                url
            )))
        }
    };

    let body = response.bytes().map_err(|e| {
        TortillaError::Transport(format!("Failed to read response body from {}: {}", url, e))
    })?;
    if body.len() as u64 != end - start + 1 {
        return Err(TortillaError::Transport(format!(
            "Short tail read from {}: range {}-{} but got {} bytes",
            url,
            start,
            end,
            body.len()
        )));
    }

    Ok((size, body))
}

/// First and last byte from `Content-Range: bytes a-b/TOTAL`
fn content_range_bounds(response: &Response) -> Option<(u64, u64)> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_bounds(value)
}

pub(crate) fn parse_content_range_bounds(value: &str) -> Option<(u64, u64)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, _) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let (start, end) = (start.trim().parse().ok()?, end.trim().parse().ok()?);
    (start <= end).then_some((start, end))
}

/// Total size from `Content-Range: bytes a-b/TOTAL` or `bytes */TOTAL`
fn content_range_total(response: &Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_total(value)
}

pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

fn status_error(url: &str, status: StatusCode) -> TortillaError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => TortillaError::SourceNotFound(url.to_string()),
        s if s.is_server_error() => {
            TortillaError::Transport(format!("Server error for {}: {}", url, s))
        }
        s => TortillaError::Transport(format!("Unexpected status {} for {}", s, url)),
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> TortillaError {
    if e.is_timeout() {
        TortillaError::Transport(format!("Timeout for {}: {}", url, e))
    } else if e.is_connect() {
        TortillaError::Transport(format!("Connection failed for {}: {}", url, e))
    } else {
        TortillaError::Transport(format!("Request failed for {}: {}", url, e))
    }
}
