use std::time::Duration;

use smol_str::{SmolStr, ToSmolStr};
use url::Url;

use crate::compress;
use crate::http::Result;

/// Decompression collaborator: raw body bytes in, decoded bytes out.
/// The url is only used to tag errors.
pub type DecodeFn = fn(&[u8], &Url) -> Result<Vec<u8>>;

/// Read-only per-process protocol configuration, shared by every fetch.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Single bound applied to connect, TLS handshake and every socket read.
    pub timeout: Duration,
    /// When set, sockets connect to this host/port instead of the target.
    pub proxy: Option<(SmolStr, u16)>,
    pub user_agent: Option<SmolStr>,
    pub accept_language: SmolStr,
    pub accept: SmolStr,
    /// TLS protocol versions to enable, e.g. `TLSv1.2`. Empty = no restriction.
    pub tls_preferred_protocols: Vec<SmolStr>,
    /// TLS cipher suites to enable, by rustls suite name. Empty = no restriction.
    pub tls_preferred_cipher_suites: Vec<SmolStr>,
    /// Maximum body bytes kept per fetch; negative means unbounded.
    pub max_content: i64,
    /// Record the resolved peer IP under `_ip_` in the response headers.
    pub store_peer_ip: bool,
    pub gzip_decode: DecodeFn,
    pub deflate_decode: DecodeFn,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            proxy: None,
            user_agent: None,
            accept_language: "en-us,en-gb,en;q=0.7,*;q=0.3".into(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into(),
            tls_preferred_protocols: Vec::new(),
            tls_preferred_cipher_suites: Vec::new(),
            max_content: 65536,
            store_peer_ip: false,
            gzip_decode: compress::gzip_decode,
            deflate_decode: compress::deflate_decode,
        }
    }
}

impl ProtocolConfig {
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn with_proxy(mut self, host: impl ToSmolStr, port: u16) -> Self {
        self.proxy = Some((host.to_smolstr(), port));
        self
    }

    #[inline]
    pub fn with_user_agent(mut self, agent: impl ToSmolStr) -> Self {
        self.user_agent = Some(agent.to_smolstr());
        self
    }

    #[inline]
    pub fn with_accept_language(mut self, accept_language: impl ToSmolStr) -> Self {
        self.accept_language = accept_language.to_smolstr();
        self
    }

    #[inline]
    pub fn with_accept(mut self, accept: impl ToSmolStr) -> Self {
        self.accept = accept.to_smolstr();
        self
    }

    #[inline]
    pub fn with_tls_preferred_protocols<I: IntoIterator<Item = impl ToSmolStr>>(mut self, protocols: I) -> Self {
        self.tls_preferred_protocols = protocols.into_iter().map(|p| p.to_smolstr()).collect();
        self
    }

    #[inline]
    pub fn with_tls_preferred_cipher_suites<I: IntoIterator<Item = impl ToSmolStr>>(mut self, suites: I) -> Self {
        self.tls_preferred_cipher_suites = suites.into_iter().map(|s| s.to_smolstr()).collect();
        self
    }

    #[inline]
    pub fn with_max_content(mut self, max_content: i64) -> Self {
        self.max_content = max_content;
        self
    }

    #[inline]
    pub fn with_store_peer_ip(mut self, store_peer_ip: bool) -> Self {
        self.store_peer_ip = store_peer_ip;
        self
    }

    #[inline]
    pub fn use_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    /// The body-size cap as a usize, `None` when unbounded.
    #[inline]
    pub(crate) fn max_content_cap(&self) -> Option<usize> {
        usize::try_from(self.max_content).ok()
    }
}
