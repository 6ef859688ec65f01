use std::io::Write as _;

use flate2::write::{DeflateDecoder, GzDecoder};
use url::Url;

use crate::http::{Error, Result};

/// Default gzip collaborator for `Content-Encoding: gzip` / `x-gzip` bodies.
pub fn gzip_decode(data: &[u8], url: &Url) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(Vec::new());
    decoder
        .write_all(data)
        .and_then(|()| decoder.finish())
        .map_err(|source| Error::Decode { url: url.as_str().into(), source })
}

/// Default deflate collaborator for `Content-Encoding: deflate` bodies.
pub fn deflate_decode(data: &[u8], url: &Url) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(Vec::new());
    decoder
        .write_all(data)
        .and_then(|()| decoder.finish())
        .map_err(|source| Error::Decode { url: url.as_str().into(), source })
}
