use hyper::{Method, Request, Response, body::Incoming, header::HOST};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info};

use crate::body::ProxyBody;
use crate::config::Config;
use crate::dump::Dump;
use crate::headers::DeniedKeySet;
use crate::relay::HttpRelay;
use crate::tunnel::TunnelEstablisher;

/// Routes each request to the tunnel or the relay path by method.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    relay: HttpRelay,
    tunnel: TunnelEstablisher,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, denied: Arc<DeniedKeySet>) -> Self {
        let relay = HttpRelay::new(config.clone(), denied);
        Self::with_handlers(config, relay, TunnelEstablisher::default())
    }

    pub fn with_handlers(config: Arc<Config>, relay: HttpRelay, tunnel: TunnelEstablisher) -> Self {
        Self {
            config,
            relay,
            tunnel,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[tracing::instrument(
        name = "request",
        skip(self, request),
        fields(method = %request.method(), target = %destination(&request))
    )]
    pub async fn dispatch(
        &self,
        request: Request<Incoming>,
        client_addr: SocketAddr,
    ) -> Response<ProxyBody> {
        info!("Dispatching request");
        debug!(request = %Dump::request(&request), "Request head");

        if request.method() == Method::CONNECT {
            self.tunnel.establish(request).await
        } else {
            self.relay.relay(request).await
        }
    }
}

/// Destination named by a request, for logging.
fn destination<B>(request: &Request<B>) -> String {
    if let Some(authority) = request.uri().authority() {
        return authority.to_string();
    }
    request
        .headers()
        .get(HOST)
        .and_then(|host| host.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
