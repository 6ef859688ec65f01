use tokio::io::{AsyncBufRead, AsyncWriteExt as _, BufReader};

use crate::config::ProtocolConfig;
use crate::connection::{self, Connection};
use crate::http::{
    parse_headers, parse_status_line, read_body, FetchRequest, FetchResult, HeaderStore, Result,
    SourceBuf, BUFFER_SIZE, PEER_IP_KEY,
};

/// Performs one fetch: connect, write the request, parse the response.
///
/// Failures up to and including the header section propagate with no partial
/// result. Failures while reading or decoding the body are logged and
/// swallowed; the result then carries the parsed status and headers with
/// `body: None`. The socket is dropped on every path.
pub async fn fetch(conf: &ProtocolConfig, request: &FetchRequest) -> Result<FetchResult> {
    let Connection { mut stream, peer } = connection::connect(conf, &request.url).await?;

    stream.write_all(&request.to_bytes(conf)).await?;
    stream.flush().await?;

    let reader = BufReader::with_capacity(BUFFER_SIZE, stream);
    let mut src = SourceBuf::new(reader, conf.timeout);

    // interim 100 Continue blocks are consumed and discarded
    let (code, mut headers) = loop {
        let code = parse_status_line(&mut src).await?;
        let mut headers = HeaderStore::new();
        parse_headers(&mut src, &mut headers).await?;
        if code != 100 {
            break (code, headers);
        }
    };

    if conf.store_peer_ip {
        headers.append(PEER_IP_KEY, peer.ip());
    }

    let body = match read_and_decode(&mut src, &mut headers, conf, request).await {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::debug!("Exception while reading content on {}: {err}", request.url);
            None
        }
    };

    Ok(FetchResult {
        url: request.url.clone(),
        code,
        headers,
        body,
    })
}

async fn read_and_decode<R: AsyncBufRead + Unpin>(
    src: &mut SourceBuf<R>,
    headers: &mut HeaderStore,
    conf: &ProtocolConfig,
    request: &FetchRequest,
) -> Result<Vec<u8>> {
    let raw = read_body(src, headers, conf.max_content_cap()).await?;

    let encoding = headers
        .first_value("content-encoding")
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match encoding.as_str() {
        "gzip" | "x-gzip" => (conf.gzip_decode)(&raw, &request.url),
        "deflate" => (conf.deflate_decode)(&raw, &request.url),
        _ => {
            log::trace!("fetched {} bytes from {}", raw.len(), request.url);
            Ok(raw)
        }
    }
}
