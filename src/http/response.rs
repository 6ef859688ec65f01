use std::collections::VecDeque;
use std::time::Duration;

use smol_str::ToSmolStr as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tokio::time;
use url::Url;

use super::{Error, HeaderStore, Result};

pub(crate) const BUFFER_SIZE: usize = 8192;

/// Immutable outcome of one fetch.
///
/// `body` is `None` when reading or decoding the body failed after the status
/// line and headers were already parsed; callers must treat that as a failed
/// fetch even though `code` and `headers` are populated.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: Url,
    pub code: u16,
    pub headers: HeaderStore,
    pub body: Option<Vec<u8>>,
}

impl FetchResult {
    /// First value of the named header, compared case-insensitively.
    #[inline]
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers.first_value(name)
    }
}

/// Stream cursor with an explicit pushback buffer; every refill from the
/// underlying reader is bounded by the fetch timeout.
pub(crate) struct SourceBuf<R> {
    reader: R,
    front: VecDeque<u8>,
    timeout: Duration,
}

impl<R: AsyncBufRead + Unpin> SourceBuf<R> {
    pub(crate) fn new(reader: R, timeout: Duration) -> Self {
        Self {
            reader,
            front: VecDeque::with_capacity(BUFFER_SIZE),
            timeout,
        }
    }

    /// Returns false at end of stream.
    async fn refill(&mut self) -> Result<bool> {
        let chunk = time::timeout(self.timeout, self.reader.fill_buf())
            .await
            .map_err(|_| Error::ReadTimeout(self.timeout))??;
        if chunk.is_empty() {
            return Ok(false);
        }
        let taken = chunk.len();
        self.front.extend(chunk.iter().copied());
        self.reader.consume(taken);
        Ok(true)
    }

    async fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.front.is_empty() && !self.refill().await? {
            return Ok(None);
        }
        Ok(self.front.pop_front())
    }

    async fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.front.is_empty() && !self.refill().await? {
            return Ok(None);
        }
        Ok(self.front.front().copied())
    }

    /// Pushes bytes back so they are the next ones read.
    pub(crate) fn unread(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.front.push_front(byte);
        }
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.front.is_empty() && !self.refill().await? {
            return Ok(0);
        }
        let take = buf.len().min(self.front.len());
        for (slot, byte) in buf.iter_mut().zip(self.front.drain(..take)) {
            *slot = byte;
        }
        Ok(take)
    }

    /// Reads one logical line (`\r\n` or bare `\n`), folding continuation
    /// lines when `allow_continued`. An empty line signals end of section.
    pub(crate) async fn read_line(&mut self, allow_continued: bool) -> Result<String> {
        let mut line = String::new();
        loop {
            let Some(byte) = self.next_byte().await? else {
                return Err(Error::UnexpectedEof);
            };
            if byte == b'\r' {
                if self.peek_byte().await? == Some(b'\n') {
                    self.next_byte().await?;
                }
            } else if byte != b'\n' {
                line.push(char::from(byte));
                continue;
            }
            if allow_continued && !line.is_empty() {
                if let Some(b' ' | b'\t') = self.peek_byte().await? {
                    self.next_byte().await?;
                    continue;
                }
            }
            return Ok(line);
        }
    }
}

/// Tolerates a missing reason phrase (`HTTP/1.1 200` as well as `HTTP/1.1 200 OK`).
pub(crate) async fn parse_status_line<R: AsyncBufRead + Unpin>(src: &mut SourceBuf<R>) -> Result<u16> {
    let line = src.read_line(false).await?;
    let mut tokens = line.splitn(3, ' ');
    tokens.next(); // protocol version
    tokens
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::BadStatusLine(line.to_smolstr()))
}

/// Parses header lines into `headers` until a blank line — or an HTML
/// document marker, for servers that omit the blank line before the body.
pub(crate) async fn parse_headers<R: AsyncBufRead + Unpin>(
    src: &mut SourceBuf<R>,
    headers: &mut HeaderStore,
) -> Result<()> {
    loop {
        let line = src.read_line(true).await?;
        if line.is_empty() {
            return Ok(());
        }

        if let Some(pos) = html_marker(&line) {
            let tail: Vec<u8> = line[pos..].chars().map(|c| c as u8).collect();
            src.unread(&tail);
            if let Err(err) = process_header_line(&line[..pos], headers) {
                log::warn!("Error parsing header before HTML marker: {err}");
            }
            return Ok(());
        }

        process_header_line(&line, headers)?;
    }
}

fn html_marker(line: &str) -> Option<usize> {
    ["<!DOCTYPE", "<HTML", "<html"]
        .iter()
        .filter_map(|marker| line.find(marker))
        .min()
}

fn process_header_line(line: &str, headers: &mut HeaderStore) -> Result<()> {
    let Some((name, rest)) = line.split_once(':') else {
        if line.chars().all(char::is_whitespace) {
            return Ok(());
        }
        return Err(Error::BadHeader(line.to_smolstr()));
    };
    let value = rest.trim_start_matches([' ', '\t']);
    headers.append(name, value);
    Ok(())
}

/// Chunked when `Transfer-Encoding: chunked`, fixed-length otherwise.
pub(crate) async fn read_body<R: AsyncBufRead + Unpin>(
    src: &mut SourceBuf<R>,
    headers: &mut HeaderStore,
    cap: Option<usize>,
) -> Result<Vec<u8>> {
    let chunked = headers
        .first_value("transfer-encoding")
        .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("chunked"));
    if chunked {
        read_chunked_content(src, headers, cap).await
    } else {
        read_plain_content(src, headers, cap).await
    }
}

async fn read_plain_content<R: AsyncBufRead + Unpin>(
    src: &mut SourceBuf<R>,
    headers: &HeaderStore,
    cap: Option<usize>,
) -> Result<Vec<u8>> {
    let mut target = usize::MAX;
    if let Some(raw) = headers.first_value("content-length") {
        let raw = raw.trim();
        if !raw.is_empty() {
            target = raw.parse().map_err(|_| Error::BadContentLength(raw.to_smolstr()))?;
        }
    }
    if let Some(cap) = cap {
        target = target.min(cap);
    }
    if target == 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(target.min(BUFFER_SIZE));
    let mut buffer = [0_u8; BUFFER_SIZE];
    while out.len() < target {
        let want = (target - out.len()).min(BUFFER_SIZE);
        let got = src.read(&mut buffer[..want]).await?;
        if got == 0 {
            break;
        }
        out.extend_from_slice(&buffer[..got]);
    }
    Ok(out)
}

// A chunk that would overflow the cap is shrunk to the remaining budget and
// the partial body accepted as-is; a short read inside a chunk is fatal.
async fn read_chunked_content<R: AsyncBufRead + Unpin>(
    src: &mut SourceBuf<R>,
    headers: &mut HeaderStore,
    cap: Option<usize>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buffer = [0_u8; BUFFER_SIZE];

    loop {
        log::trace!("starting chunk");
        let line = src.read_line(false).await?;
        let size_token = line.split(';').next().unwrap_or_default().trim();
        let mut chunk_len = usize::from_str_radix(size_token, 16)
            .map_err(|_| Error::BadChunkLength(line.to_smolstr()))?;

        if chunk_len == 0 {
            break;
        }

        let mut truncated = false;
        if let Some(cap) = cap {
            if out.len() + chunk_len > cap {
                chunk_len = cap - out.len();
                truncated = true;
            }
        }

        let mut chunk_read = 0;
        while chunk_read < chunk_len {
            let want = (chunk_len - chunk_read).min(BUFFER_SIZE);
            let got = src.read(&mut buffer[..want]).await?;
            if got == 0 {
                return Err(Error::ChunkEof {
                    done: out.len() - chunk_read,
                    partial: chunk_read,
                });
            }
            out.extend_from_slice(&buffer[..got]);
            chunk_read += got;
        }

        if truncated {
            // budget exhausted: keep the partial body, the trailer is unreachable
            return Ok(out);
        }

        src.read_line(false).await?; // the chunk's trailing terminator
    }

    parse_headers(src, headers).await?; // trailer block
    Ok(out)
}
