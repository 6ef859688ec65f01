use std::time::Duration;

use smol_str::SmolStr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Unsupported scheme (not http/https) for url: {0}")]
    SchemeUnsupported(SmolStr),
    #[error("Connect failed: {0}")]
    Connect(std::io::Error),
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),
    #[error("TLS negotiation failed: {0}")]
    TlsNegotiation(SmolStr),
    #[error("Bad status line: {0}")]
    BadStatusLine(SmolStr),
    #[error("No colon in header: {0}")]
    BadHeader(SmolStr),
    #[error("Bad Content-Length: {0}")]
    BadContentLength(SmolStr),
    #[error("Bad chunk length: {0}")]
    BadChunkLength(SmolStr),
    #[error("Chunk eof after {done} bytes in successful chunks and {partial} in current chunk")]
    ChunkEof { done: usize, partial: usize },
    #[error("Unexpected end of stream")]
    UnexpectedEof,
    #[error("Failed decoding content from {url}: {source}")]
    Decode { url: SmolStr, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
