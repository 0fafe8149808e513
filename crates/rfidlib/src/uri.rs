//! Reader URI parsing and variant dispatch.
//!
//! Readers are named by URI: the scheme selects the wire protocol and
//! the rest identifies the serial device or network endpoint.
//!
//! | URI form | Variant |
//! |---|---|
//! | `eapi:///dev/ttyUSB0` | embedded serial protocol, local device |
//! | `tmr:///dev/ttyUSB0` | alias for `eapi` |
//! | `tmr://host[:port]` | probe LLRP (port 5084); fall back to RQL |
//! | `rql://host[:port]` | RQL text protocol (default port 8080) |
//! | `llrp://host[:port]` | LLRP binary protocol (default port 5084) |
//!
//! The `tmr://host` guess is resolved per call: the probe opens one TCP
//! connection to the LLRP port and closes it again. Nothing is shared
//! between reader instances.

use std::time::Duration;

use rfidlib_core::error::{Error, Result};
use rfidlib_core::transport::Transport;
use rfidlib_transport::TcpTransport;

/// Default LLRP port.
pub const LLRP_DEFAULT_PORT: u16 = 5084;

/// Default RQL port.
pub const RQL_DEFAULT_PORT: u16 = 8080;

/// How long the LLRP probe waits for a connection.
const LLRP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A parsed reader URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderUri {
    /// The scheme, lowercased.
    pub scheme: String,
    /// Host portion, when present.
    pub host: Option<String>,
    /// Explicit port, when present.
    pub port: Option<u16>,
    /// Path portion (the serial device node for local schemes).
    pub path: String,
}

impl ReaderUri {
    /// Parse `scheme://[host[:port]][/path]`.
    pub fn parse(uri: &str) -> Result<ReaderUri> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidUri(format!("'{uri}' has no scheme")))?;
        if scheme.is_empty() {
            return Err(Error::InvalidUri(format!("'{uri}' has a blank scheme")));
        }

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        let (host, port) = if authority.is_empty() {
            (None, None)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => {
                    let port: u16 = port.parse().map_err(|_| {
                        Error::InvalidUri(format!("'{port}' is not a valid port in '{uri}'"))
                    })?;
                    (Some(host.to_string()), Some(port))
                }
                None => (Some(authority.to_string()), None),
            }
        };

        Ok(ReaderUri {
            scheme: scheme.to_lowercase(),
            host,
            port,
            path: path.to_string(),
        })
    }

    /// The `host:port` endpoint string with `default_port` applied.
    pub fn endpoint(&self, default_port: u16) -> Result<String> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| Error::InvalidUri("URI names no host".into()))?;
        Ok(format!("{host}:{}", self.port.unwrap_or(default_port)))
    }
}

/// The reader variant a URI resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderKind {
    /// Embedded serial protocol over the named device node.
    Eapi {
        /// Serial device path.
        device: String,
    },
    /// RQL text protocol.
    Rql {
        /// Target endpoint, `host:port`.
        endpoint: String,
    },
    /// LLRP binary protocol.
    Llrp {
        /// Target endpoint, `host:port`.
        endpoint: String,
    },
}

/// Resolve a parsed URI to its reader variant.
///
/// `tmr` with an authority is ambiguous: the LLRP port is probed first
/// and a non-answering host falls back to RQL. The probe socket is
/// always closed before returning.
pub async fn resolve(uri: &ReaderUri) -> Result<ReaderKind> {
    match uri.scheme.as_str() {
        "eapi" | "tmr" if uri.host.is_none() => {
            if uri.path.is_empty() || uri.path == "/" {
                return Err(Error::InvalidUri(
                    "serial URI names no device path".into(),
                ));
            }
            Ok(ReaderKind::Eapi {
                device: uri.path.clone(),
            })
        }
        "eapi" => Err(Error::InvalidUri(
            "remote hosts are not supported for eapi".into(),
        )),
        "tmr" => {
            let llrp_endpoint = uri.endpoint(LLRP_DEFAULT_PORT)?;
            if probe_llrp(&llrp_endpoint).await {
                Ok(ReaderKind::Llrp {
                    endpoint: llrp_endpoint,
                })
            } else {
                Ok(ReaderKind::Rql {
                    endpoint: uri.endpoint(RQL_DEFAULT_PORT)?,
                })
            }
        }
        "rql" => {
            if !(uri.path.is_empty() || uri.path == "/") {
                return Err(Error::InvalidUri(format!(
                    "path '{}' is not supported for rql",
                    uri.path
                )));
            }
            Ok(ReaderKind::Rql {
                endpoint: uri.endpoint(RQL_DEFAULT_PORT)?,
            })
        }
        "llrp" => Ok(ReaderKind::Llrp {
            endpoint: uri.endpoint(LLRP_DEFAULT_PORT)?,
        }),
        other => Err(Error::InvalidUri(format!("unknown scheme '{other}'"))),
    }
}

/// Probe whether `endpoint` answers on its LLRP port.
///
/// A plain TCP connect with a short timeout; the socket is closed before
/// returning regardless of outcome.
pub async fn probe_llrp(endpoint: &str) -> bool {
    match TcpTransport::connect_with_timeout(endpoint, LLRP_PROBE_TIMEOUT).await {
        Ok(mut transport) => {
            let _ = transport.close().await;
            tracing::debug!(endpoint, "LLRP probe answered");
            true
        }
        Err(e) => {
            tracing::debug!(endpoint, error = %e, "LLRP probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serial_uri() {
        let uri = ReaderUri::parse("eapi:///dev/ttyUSB0").unwrap();
        assert_eq!(uri.scheme, "eapi");
        assert_eq!(uri.host, None);
        assert_eq!(uri.path, "/dev/ttyUSB0");
    }

    #[test]
    fn parse_host_uri() {
        let uri = ReaderUri::parse("rql://reader.example.com:2500/").unwrap();
        assert_eq!(uri.scheme, "rql");
        assert_eq!(uri.host.as_deref(), Some("reader.example.com"));
        assert_eq!(uri.port, Some(2500));
        assert_eq!(uri.path, "/");
    }

    #[test]
    fn parse_rejects_schemeless() {
        assert!(matches!(
            ReaderUri::parse("/dev/ttyUSB0"),
            Err(Error::InvalidUri(_))
        ));
        assert!(matches!(
            ReaderUri::parse("://nothing"),
            Err(Error::InvalidUri(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_port() {
        assert!(matches!(
            ReaderUri::parse("rql://host:notaport"),
            Err(Error::InvalidUri(_))
        ));
    }

    #[tokio::test]
    async fn resolve_eapi_and_alias() {
        let uri = ReaderUri::parse("eapi:///dev/ttyUSB0").unwrap();
        assert_eq!(
            resolve(&uri).await.unwrap(),
            ReaderKind::Eapi {
                device: "/dev/ttyUSB0".into()
            }
        );

        let uri = ReaderUri::parse("tmr:///dev/ttyS0").unwrap();
        assert_eq!(
            resolve(&uri).await.unwrap(),
            ReaderKind::Eapi {
                device: "/dev/ttyS0".into()
            }
        );
    }

    #[tokio::test]
    async fn resolve_rejects_remote_eapi() {
        let uri = ReaderUri::parse("eapi://remotehost/dev/ttyUSB0").unwrap();
        assert!(matches!(resolve(&uri).await, Err(Error::InvalidUri(_))));
    }

    #[tokio::test]
    async fn resolve_rejects_serial_without_device() {
        let uri = ReaderUri::parse("eapi:///").unwrap();
        assert!(matches!(resolve(&uri).await, Err(Error::InvalidUri(_))));
    }

    #[tokio::test]
    async fn resolve_rql_defaults_port() {
        let uri = ReaderUri::parse("rql://reader.example.com").unwrap();
        assert_eq!(
            resolve(&uri).await.unwrap(),
            ReaderKind::Rql {
                endpoint: "reader.example.com:8080".into()
            }
        );
    }

    #[tokio::test]
    async fn resolve_rql_rejects_path() {
        let uri = ReaderUri::parse("rql://host/some/path").unwrap();
        assert!(matches!(resolve(&uri).await, Err(Error::InvalidUri(_))));
    }

    #[tokio::test]
    async fn resolve_llrp_defaults_port() {
        let uri = ReaderUri::parse("llrp://10.0.0.5").unwrap();
        assert_eq!(
            resolve(&uri).await.unwrap(),
            ReaderKind::Llrp {
                endpoint: "10.0.0.5:5084".into()
            }
        );
    }

    #[tokio::test]
    async fn resolve_unknown_scheme() {
        let uri = ReaderUri::parse("ftp://host").unwrap();
        assert!(matches!(resolve(&uri).await, Err(Error::InvalidUri(_))));
    }

    #[tokio::test]
    async fn tmr_guess_probes_llrp_then_falls_back() {
        use tokio::net::TcpListener;

        // An answering LLRP port resolves to LLRP.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let uri = ReaderUri::parse(&format!("tmr://127.0.0.1:{}", addr.port())).unwrap();
        match resolve(&uri).await.unwrap() {
            ReaderKind::Llrp { endpoint } => assert_eq!(endpoint, addr.to_string()),
            other => panic!("expected LLRP, got {other:?}"),
        }
        accept.await.unwrap();

        // A refused LLRP port falls back to RQL on the same host.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);

        let uri = ReaderUri::parse(&format!("tmr://127.0.0.1:{}", closed_addr.port())).unwrap();
        match resolve(&uri).await.unwrap() {
            // The explicit port carries over to the fallback endpoint.
            ReaderKind::Rql { endpoint } => assert_eq!(endpoint, closed_addr.to_string()),
            other => panic!("expected RQL fallback, got {other:?}"),
        }

        // Without an explicit port the fallback uses the RQL default.
        let uri = ReaderUri::parse("rql://fallback.example.com").unwrap();
        match resolve(&uri).await.unwrap() {
            ReaderKind::Rql { endpoint } => {
                assert_eq!(endpoint, format!("fallback.example.com:{RQL_DEFAULT_PORT}"));
            }
            other => panic!("expected RQL, got {other:?}"),
        }
    }
}
