//! CONNECT tunnels.
//!
//! The destination is dialed before the client gets its `200`, then the client
//! connection is taken over from hyper and bytes are pumped in both directions
//! by two independent tasks.

use hyper::{Request, Response, Uri, upgrade::OnUpgrade};
use hyper_util::rt::TokioIo;
use std::{fmt, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, warn};

use crate::body::{ProxyBody, empty};
use crate::error::{ProxyError, Result};

pub const BUFFER_SIZE: usize = 8192;
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to destination.
    Upstream,
    /// Destination to client.
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream => f.write_str("client->destination"),
            Self::Downstream => f.write_str("destination->client"),
        }
    }
}

/// The two copy tasks of one tunnel. Each resolves to the number of bytes it moved.
pub struct TunnelPair {
    pub upstream: JoinHandle<std::io::Result<u64>>,
    pub downstream: JoinHandle<std::io::Result<u64>>,
}

#[derive(Debug, Clone)]
pub struct TunnelEstablisher {
    connect_timeout: Duration,
}

impl Default for TunnelEstablisher {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

impl TunnelEstablisher {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Answers a CONNECT request. Errors become plain-text error responses.
    pub async fn establish<B>(&self, request: Request<B>) -> Response<ProxyBody> {
        match self.try_establish(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Tunnel not established");
                e.into_response()
            }
        }
    }

    async fn try_establish<B>(&self, mut request: Request<B>) -> Result<Response<ProxyBody>> {
        let target = connect_target(request.uri())?;
        let destination = self.dial(&target).await?;
        info!(target = %target, "Connected to destination");

        // Without an upgrade handle the destination socket is dropped unused.
        let on_upgrade = request
            .extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(ProxyError::UpgradeUnavailable)?;

        // The upgrade resolves only after the 200 below has been written.
        tokio::spawn(
            async move {
                match on_upgrade.await {
                    Ok(upgraded) => {
                        spawn_tunnel(TokioIo::new(upgraded), destination);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to take over client connection");
                    }
                }
            }
            .in_current_span(),
        );

        Ok(Response::new(empty()))
    }

    /// Opens the destination connection, bounded by the connect timeout.
    pub async fn dial(&self, target: &str) -> Result<TcpStream> {
        debug!(target = %target, "Attempting to connect to destination");
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ProxyError::Dial {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(ProxyError::DialTimeout {
                target: target.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

/// Extracts `host:port` from a CONNECT request target.
pub fn connect_target(uri: &Uri) -> Result<String> {
    uri.authority()
        .filter(|authority| authority.port_u16().is_some() && !authority.host().is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ProxyError::InvalidTarget(uri.to_string()))
}

/// Starts both copy directions between an already upgraded client and the destination.
pub fn spawn_tunnel<C>(client: C, destination: TcpStream) -> TunnelPair
where
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_reader, client_writer) = tokio::io::split(client);
    let (destination_reader, destination_writer) = destination.into_split();

    let upstream = tokio::spawn(
        pump(client_reader, destination_writer, Direction::Upstream).in_current_span(),
    );
    let downstream = tokio::spawn(
        pump(destination_reader, client_writer, Direction::Downstream).in_current_span(),
    );

    TunnelPair {
        upstream,
        downstream,
    }
}

/// Copies `reader` into `writer` until end-of-stream or an error, then shuts
/// `writer` down and drops `reader`.
pub async fn pump<R, W>(mut reader: R, mut writer: W, direction: Direction) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = copy_until_closed(&mut reader, &mut writer, direction).await;

    if let Err(e) = writer.shutdown().await {
        debug!(direction = %direction, error = %e, "Shutdown after copy failed");
    }
    drop(reader);

    match &result {
        Ok(bytes) => info!(direction = %direction, bytes, "Tunnel direction closed"),
        Err(e) => warn!(direction = %direction, error = %e, "Tunnel direction failed"),
    }
    result
}

async fn copy_until_closed<R, W>(
    reader: &mut R,
    writer: &mut W,
    direction: Direction,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buffer).await? {
            0 => return Ok(total),
            n => {
                debug!(direction = %direction, bytes = n, "Forwarding tunnel data");
                writer.write_all(&buffer[..n]).await?;
                writer.flush().await?;
                total += n as u64;
            }
        }
    }
}
