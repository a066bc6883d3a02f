//! Plain HTTP forwarding.

use bytes::Bytes;
use http::{Uri, request, uri::Scheme};
use http_body_util::BodyExt;
use hyper::{Request, Response, body::Body, header::HOST};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::body::{ProxyBody, full};
use crate::config::Config;
use crate::dump::Dump;
use crate::error::{ProxyError, Result};
use crate::headers::{DeniedKeySet, filter_headers};

pub type HttpClient = Client<HttpConnector, ProxyBody>;

/// Forwards non-CONNECT requests and strips denied headers from the responses.
#[derive(Clone)]
pub struct HttpRelay {
    client: HttpClient,
    config: Arc<Config>,
    denied: Arc<DeniedKeySet>,
}

impl HttpRelay {
    pub fn new(config: Arc<Config>, denied: Arc<DeniedKeySet>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self::with_client(client, config, denied)
    }

    pub fn with_client(client: HttpClient, config: Arc<Config>, denied: Arc<DeniedKeySet>) -> Self {
        Self {
            client,
            config,
            denied,
        }
    }

    pub async fn relay<B>(&self, request: Request<B>) -> Response<ProxyBody>
    where
        B: Body<Data = Bytes, Error = hyper::Error> + Send + Sync + 'static,
    {
        match self.try_relay(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Relay failed");
                e.into_response()
            }
        }
    }

    async fn try_relay<B>(&self, request: Request<B>) -> Result<Response<ProxyBody>>
    where
        B: Body<Data = Bytes, Error = hyper::Error> + Send + Sync + 'static,
    {
        let (mut parts, body) = request.into_parts();
        parts.uri = destination_uri(&parts)?;

        let body = if self.config.log_request_body {
            let bytes = body.collect().await.map_err(ProxyError::Capture)?.to_bytes();
            info!(request = %Dump::request_parts(&parts).with_body(&bytes), "HTTP request");
            full(bytes)
        } else {
            body.boxed()
        };

        debug!(uri = %parts.uri, "Forwarding request");
        let response = self.client.request(Request::from_parts(parts, body)).await?;
        let (mut parts, body) = response.into_parts();

        let filtered = filter_headers(&parts.headers, &self.denied);

        if self.config.log_response_body {
            let bytes = body.collect().await.map_err(ProxyError::Capture)?.to_bytes();
            info!(response = %Dump::response_parts(&parts).with_body(&bytes), "HTTP raw response");
            parts.headers = filtered;
            info!(response = %Dump::response_parts(&parts).with_body(&bytes), "HTTP final response");
            return Ok(Response::from_parts(parts, full(bytes)));
        }

        debug!(response = %Dump::response_parts(&parts), "HTTP raw response");
        parts.headers = filtered;
        debug!(response = %Dump::response_parts(&parts), "HTTP final response");
        Ok(Response::from_parts(parts, body.boxed()))
    }
}

/// Absolute URI of the destination. Origin-form targets are resolved against `Host`.
pub fn destination_uri(parts: &request::Parts) -> Result<Uri> {
    if parts.uri.authority().is_some() {
        return Ok(parts.uri.clone());
    }

    let host = parts
        .headers
        .get(HOST)
        .and_then(|host| host.to_str().ok())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ProxyError::Destination(parts.uri.to_string()))?;
    let path = parts
        .uri
        .path_and_query()
        .map_or("/", http::uri::PathAndQuery::as_str);

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(host)
        .path_and_query(path)
        .build()
        .map_err(|e| ProxyError::Destination(format!("{}: {e}", parts.uri)))
}
