use std::future::Future;
use std::time::Duration;

use http::{Request, Response};
use hyper::client::HttpConnector;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};

use crate::error::{Error, Result};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client seam for executing prepared push requests.
///
/// The pusher hands over a fully formed request; reading the response body,
/// interpreting status codes and retrying are left to the caller. Dropping
/// the returned future cancels the request.
pub trait Transport: Send + Sync {
    type Body;

    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Self::Body>>> + Send;
}

/// Default transport: hyper over rustls with a per-request timeout.
pub struct HyperTransport {
    client: hyper::Client<HttpsConnector<HttpConnector>, hyper::Body>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new(timeout: Duration) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_only()
            .enable_http1()
            .build();
        Self {
            client: hyper::Client::builder().build(https),
            timeout,
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for HyperTransport {
    type Body = hyper::Body;

    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Self::Body>>> + Send {
        let response = self.client.request(request.map(hyper::Body::from));
        let timeout = self.timeout;
        async move {
            match tokio::time::timeout(timeout, response).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(Error::Transport(Box::new(err))),
                Err(elapsed) => Err(Error::Transport(Box::new(elapsed))),
            }
        }
    }
}
