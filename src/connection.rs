use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use smol_str::ToSmolStr as _;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use url::Url;

use crate::config::ProtocolConfig;
use crate::http::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub(crate) fn of(url: &Url) -> Result<Self> {
        match url.scheme() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            _ => Err(Error::SchemeUnsupported(url.as_str().into())),
        }
    }

    #[inline]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// The open socket of one fetch, plain or TLS-wrapped.
/// Closing is by drop, on every exit path.
pub enum FetchStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for FetchStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for FetchStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

pub struct Connection {
    pub stream: FetchStream,
    pub peer: SocketAddr,
}

/// Opens a ready-to-write socket for the url: direct or via the configured
/// proxy, upgraded to TLS for https.
pub async fn connect(conf: &ProtocolConfig, url: &Url) -> Result<Connection> {
    let scheme = Scheme::of(url)?;
    let host = url.host_str().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or_else(|| scheme.default_port());

    let (sock_host, sock_port) = match conf.proxy.as_ref() {
        Some((proxy_host, proxy_port)) => (proxy_host.as_str(), *proxy_port),
        None => (host, port),
    };

    let stream = time::timeout(conf.timeout, TcpStream::connect((sock_host, sock_port)))
        .await
        .map_err(|_| Error::ConnectTimeout(conf.timeout))?
        .map_err(Error::Connect)?;
    let peer = stream.peer_addr()?;

    let stream = match scheme {
        Scheme::Http => FetchStream::Plain(stream),
        Scheme::Https => {
            let connector = TlsConnector::from(Arc::new(tls_client_config(conf)?));
            let server_name = ServerName::try_from(sock_host.to_string())
                .map_err(|err| Error::TlsNegotiation(err.to_smolstr()))?;
            let tls = time::timeout(conf.timeout, connector.connect(server_name, stream))
                .await
                .map_err(|_| Error::ConnectTimeout(conf.timeout))?
                .map_err(|err| Error::TlsNegotiation(err.to_smolstr()))?;
            FetchStream::Tls(Box::new(tls))
        }
    };

    Ok(Connection { stream, peer })
}

// The provider's supported cipher suites and protocol versions are
// intersected with the configured preferred lists, so the enabled sets are
// operator-controlled. An empty list leaves the corresponding set unrestricted.
fn tls_client_config(conf: &ProtocolConfig) -> Result<ClientConfig> {
    let mut provider = ring::default_provider();
    if !conf.tls_preferred_cipher_suites.is_empty() {
        provider.cipher_suites.retain(|suite| {
            let name = format!("{:?}", suite.suite());
            conf.tls_preferred_cipher_suites.iter().any(|preferred| *preferred == name)
        });
    }

    let versions: Vec<&'static rustls::SupportedProtocolVersion> = rustls::ALL_VERSIONS
        .iter()
        .copied()
        .filter(|supported| {
            conf.tls_preferred_protocols.is_empty()
                || conf
                    .tls_preferred_protocols
                    .iter()
                    .any(|preferred| *preferred == protocol_name(supported.version))
        })
        .collect();

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&versions)
        .map_err(|err| Error::TlsNegotiation(err.to_smolstr()))
        .map(|builder| builder.with_root_certificates(roots).with_no_client_auth())
}

fn protocol_name(version: rustls::ProtocolVersion) -> &'static str {
    match version {
        rustls::ProtocolVersion::TLSv1_2 => "TLSv1.2",
        rustls::ProtocolVersion::TLSv1_3 => "TLSv1.3",
        _ => "",
    }
}

#[cfg(test)]
mod test {
    use url::Url;

    use super::{connect, Scheme};
    use crate::config::ProtocolConfig;
    use crate::http::Error;

    #[test]
    fn only_http_and_https_schemes_are_accepted() {
        let http = Url::parse("http://example.com/").unwrap();
        let https = Url::parse("https://example.com/").unwrap();
        let ftp = Url::parse("ftp://example.com/").unwrap();

        assert_eq!(Scheme::of(&http).unwrap(), Scheme::Http);
        assert_eq!(Scheme::of(&https).unwrap(), Scheme::Https);
        assert!(matches!(Scheme::of(&ftp), Err(Error::SchemeUnsupported(_))));
    }

    #[test]
    fn default_ports() {
        assert_eq!(Scheme::Http.default_port(), 80);
        assert_eq!(Scheme::Https.default_port(), 443);
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_before_any_io() {
        let conf = ProtocolConfig::default();
        let url = Url::parse("gopher://localhost:1/").unwrap();
        assert!(matches!(
            connect(&conf, &url).await,
            Err(Error::SchemeUnsupported(_))
        ));
    }

    #[test]
    fn tls_config_builds_with_restricted_versions() {
        let conf = ProtocolConfig::default().with_tls_preferred_protocols(["TLSv1.3"]);
        super::tls_client_config(&conf).unwrap();
    }

    #[test]
    fn tls_config_rejects_an_empty_intersection() {
        let conf = ProtocolConfig::default().with_tls_preferred_protocols(["SSLv3"]);
        assert!(matches!(
            super::tls_client_config(&conf),
            Err(Error::TlsNegotiation(_))
        ));
    }
}
