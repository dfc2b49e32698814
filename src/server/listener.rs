//! Bound sockets a [`Server`](super::Server) can accept connections from.

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use super::{ServerError, tls};

/// A bound, listening socket.
pub enum Listener {
    /// Plain HTTP over TCP.
    Tcp(TcpListener),
    /// HTTPS: TCP plus a TLS handshake on every accepted connection.
    Tls {
        listener: TcpListener,
        acceptor: TlsAcceptor,
    },
    /// Plain HTTP over a Unix domain socket.
    #[cfg(unix)]
    Unix(UnixListener),
}

/// An accepted connection, before any TLS handshake.
pub(crate) enum Connection {
    Plain(TcpStream),
    Tls(TlsAcceptor, TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Listener {
    /// The bound TCP address; `None` for Unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) | Self::Tls { listener, .. } => listener.local_addr().ok(),
            #[cfg(unix)]
            Self::Unix(_) => None,
        }
    }

    /// Waits for the next connection and describes its peer for logging.
    pub(crate) async fn accept(&self) -> io::Result<(Connection, String)> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Connection::Plain(stream), peer.to_string()))
            }
            Self::Tls { listener, acceptor } => {
                let (stream, peer) = listener.accept().await?;
                Ok((Connection::Tls(acceptor.clone(), stream), peer.to_string()))
            }
            #[cfg(unix)]
            Self::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((Connection::Unix(stream), "unix".to_owned()))
            }
        }
    }
}

/// Binds a plain HTTP listener on `ip:port`.
///
/// Port `0` picks a free port; read it back with [`Listener::local_addr`].
///
/// # Errors
///
/// [`ServerError::Bind`] when the address cannot be bound.
pub async fn http_listener(ip: &str, port: u16) -> Result<Listener, ServerError> {
    let listener = bind_tcp(ip, port).await?;
    info!(%ip, port, "http listener bound");
    Ok(Listener::Tcp(listener))
}

/// Binds an HTTPS listener on `ip:port` using a PEM certificate chain and key.
///
/// # Errors
///
/// Any error from [`tls::acceptor`], or [`ServerError::Bind`] when the address
/// cannot be bound.
pub async fn tls_listener(
    ip: &str,
    port: u16,
    cert_file: impl AsRef<Path>,
    key_file: impl AsRef<Path>,
) -> Result<Listener, ServerError> {
    let acceptor = tls::acceptor(cert_file.as_ref(), key_file.as_ref()).await?;
    let listener = bind_tcp(ip, port).await?;
    info!(%ip, port, "https listener bound");
    Ok(Listener::Tls { listener, acceptor })
}

/// Binds a Unix domain socket at `path` and sets its file mode to `mode`.
///
/// A socket file left over from a previous run is removed first.
///
/// # Errors
///
/// [`ServerError::Io`] when the stale file cannot be removed or permissions
/// cannot be set, [`ServerError::Bind`] when binding fails.
#[cfg(unix)]
pub async fn unix_listener(path: impl AsRef<Path>, mode: u32) -> Result<Listener, ServerError> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    let path = path.as_ref();
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
        addr: path.display().to_string(),
        source,
    })?;
    tokio::fs::set_permissions(path, Permissions::from_mode(mode)).await?;

    info!(path = %path.display(), mode = %format!("{mode:o}"), "unix listener bound");
    Ok(Listener::Unix(listener))
}

async fn bind_tcp(ip: &str, port: u16) -> Result<TcpListener, ServerError> {
    TcpListener::bind((ip, port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{ip}:{port}"),
            source,
        })
}
