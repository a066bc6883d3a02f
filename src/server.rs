//! Accept loop and graceful shutdown.

use anyhow::{Context, Result};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, future::Future, pin::pin};
use tokio::{net::TcpListener, sync::watch, task::JoinSet};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::proxy::Dispatcher;

/// Serves connections from `listener` until `shutdown` resolves, then waits
/// for in-flight HTTP connections to finish. Established tunnels are detached
/// and are not waited for.
pub async fn serve<F>(listener: TcpListener, dispatcher: Dispatcher, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let local_addr = listener
        .local_addr()
        .context("Failed to get listener local address")?;
    info!(
        listen_addr = %local_addr,
        log_request_body = dispatcher.config().log_request_body,
        log_response_body = dispatcher.config().log_response_body,
        "Forward proxy listening"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut connections = JoinSet::new();
    let mut shutdown = pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, client_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let dispatcher = dispatcher.clone();
                let stop_rx = stop_rx.clone();
                connections.spawn(
                    serve_connection(stream, client_addr, dispatcher, stop_rx)
                        .instrument(info_span!("connection", client_addr = %client_addr)),
                );
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            () = &mut shutdown => {
                info!(in_flight = connections.len(), "Shutdown requested, draining connections");
                break;
            }
        }
    }

    drop(listener);
    let _ = stop_tx.send(true);
    while connections.join_next().await.is_some() {}

    info!("Forward proxy stopped");
    Ok(())
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    client_addr: std::net::SocketAddr,
    dispatcher: Dispatcher,
    mut stop_rx: watch::Receiver<bool>,
) {
    let service = service_fn(move |request| {
        let dispatcher = dispatcher.clone();
        async move { Ok::<_, Infallible>(dispatcher.dispatch(request, client_addr).await) }
    });

    let mut connection = pin!(
        http1::Builder::new()
            .preserve_header_case(true)
            .title_case_headers(true)
            .serve_connection(TokioIo::new(stream), service)
            .with_upgrades()
    );

    let result = tokio::select! {
        result = connection.as_mut() => result,
        () = async {
            let _ = stop_rx.wait_for(|stopping| *stopping).await;
        } => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    match result {
        Ok(()) => debug!("Connection closed"),
        Err(e) => debug!(error = %e, "Connection closed with error"),
    }
}
