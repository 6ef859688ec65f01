use smol_str::{SmolStr, ToSmolStr};
use url::{Position, Url};

use crate::config::ProtocolConfig;

/// Immutable input of one fetch: the target URL plus the cached validators
/// used to build a conditional request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub cached_last_modified: Option<SmolStr>,
    pub cached_etag: Option<SmolStr>,
}

impl FetchRequest {
    #[inline]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            cached_last_modified: None,
            cached_etag: None,
        }
    }

    #[inline]
    pub fn with_cached_last_modified(mut self, last_modified: impl ToSmolStr) -> Self {
        self.cached_last_modified = Some(last_modified.to_smolstr());
        self
    }

    #[inline]
    pub fn with_cached_etag(mut self, etag: impl ToSmolStr) -> Self {
        self.cached_etag = Some(etag.to_smolstr());
        self
    }

    /// The exact byte sequence written to the socket, one byte per character.
    /// The request target is the path unless proxying, which sends the
    /// absolute URL.
    pub fn to_bytes(&self, conf: &ProtocolConfig) -> Vec<u8> {
        let host = self.url.host_str().unwrap_or_default();
        let port_suffix = match self.url.port() {
            Some(port) => format!(":{port}"),
            None => String::new(),
        };
        let file = &self.url[Position::BeforePath..Position::AfterQuery];
        let file = if file.is_empty() { "/" } else { file };

        let mut req = String::from("GET ");
        if conf.use_proxy() {
            req.push_str(self.url.scheme());
            req.push_str("://");
            req.push_str(host);
            req.push_str(&port_suffix);
            req.push_str(file);
        } else {
            req.push_str(file);
        }
        req.push_str(" HTTP/1.0\r\n");

        req.push_str("Host: ");
        req.push_str(host);
        req.push_str(&port_suffix);
        req.push_str("\r\n");

        req.push_str("Accept-Encoding: x-gzip, gzip, deflate\r\n");

        match conf.user_agent.as_deref() {
            Some(agent) if !agent.trim().is_empty() => {
                req.push_str("User-Agent: ");
                req.push_str(agent);
                req.push_str("\r\n");
            }
            _ => log::warn!("User-agent is not set!"),
        }

        req.push_str("Accept-Language: ");
        req.push_str(&conf.accept_language);
        req.push_str("\r\n");

        req.push_str("Accept: ");
        req.push_str(&conf.accept);
        req.push_str("\r\n");

        if let Some(since) = self.cached_last_modified.as_deref() {
            if !since.trim().is_empty() {
                req.push_str("If-Modified-Since: ");
                req.push_str(since);
                req.push_str("\r\n");
            }
        }

        if let Some(etag) = self.cached_etag.as_deref() {
            if !etag.trim().is_empty() {
                req.push_str("If-None-Match: ");
                req.push_str(etag);
                req.push_str("\r\n");
            }
        }

        req.push_str("\r\n");

        latin1(&req)
    }
}

/// Latin-1 wire encoding; characters above U+00FF degrade to `?`.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if u32::from(c) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod test {
    use url::Url;

    use super::FetchRequest;
    use crate::config::ProtocolConfig;

    fn serialize(request: &FetchRequest, conf: &ProtocolConfig) -> String {
        request.to_bytes(conf).iter().map(|&b| char::from(b)).collect()
    }

    #[test]
    fn plain_get_with_default_port() {
        let conf = ProtocolConfig::default().with_user_agent("grebe-test/1.0");
        let request = FetchRequest::new(Url::parse("http://example.com/a/b?q=1").unwrap());
        let req = serialize(&request, &conf);

        assert!(req.starts_with("GET /a/b?q=1 HTTP/1.0\r\n"));
        assert!(req.contains("Host: example.com\r\n"));
        assert!(req.contains("Accept-Encoding: x-gzip, gzip, deflate\r\n"));
        assert!(req.contains("User-Agent: grebe-test/1.0\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn empty_path_defaults_to_root() {
        let conf = ProtocolConfig::default();
        let request = FetchRequest::new(Url::parse("http://example.com").unwrap());
        let req = serialize(&request, &conf);

        assert!(req.starts_with("GET / HTTP/1.0\r\n"));
    }

    #[test]
    fn explicit_port_lands_in_host_and_request_line() {
        let conf = ProtocolConfig::default().with_proxy("proxy.local", 3128);
        let request = FetchRequest::new(Url::parse("http://example.com:8080/x").unwrap());
        let req = serialize(&request, &conf);

        assert!(req.starts_with("GET http://example.com:8080/x HTTP/1.0\r\n"));
        assert!(req.contains("Host: example.com:8080\r\n"));
    }

    #[test]
    fn conditional_validators_are_emitted_when_non_blank() {
        let conf = ProtocolConfig::default();
        let request = FetchRequest::new(Url::parse("http://example.com/").unwrap())
            .with_cached_last_modified("Tue, 01 Jan 2030 00:00:00 GMT")
            .with_cached_etag("\"abc123\"");
        let req = serialize(&request, &conf);

        assert!(req.contains("If-Modified-Since: Tue, 01 Jan 2030 00:00:00 GMT\r\n"));
        assert!(req.contains("If-None-Match: \"abc123\"\r\n"));
    }

    #[test]
    fn blank_validators_are_skipped() {
        let conf = ProtocolConfig::default();
        let request = FetchRequest::new(Url::parse("http://example.com/").unwrap())
            .with_cached_last_modified("   ")
            .with_cached_etag("");
        let req = serialize(&request, &conf);

        assert!(!req.contains("If-Modified-Since"));
        assert!(!req.contains("If-None-Match"));
    }

    #[test]
    fn wide_characters_degrade_to_question_marks() {
        let conf = ProtocolConfig::default().with_user_agent("grebé-\u{4e2d}");
        let request = FetchRequest::new(Url::parse("http://example.com/").unwrap());
        let bytes = request.to_bytes(&conf);

        let req: String = bytes.iter().map(|&b| char::from(b)).collect();
        assert!(req.contains("User-Agent: greb\u{e9}-?\r\n"));
    }
}
