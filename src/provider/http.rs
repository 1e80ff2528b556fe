// Shared hyper client plumbing for the provider adapters.

use http_body_util::{BodyExt, Full};
use hyper::Response;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::Client, client::legacy::connect::HttpConnector, rt::TokioExecutor,
};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use tokio_util::bytes::Bytes;

/// A type alias for the HTTPS connector.
pub type HttpsConnectorType = HttpsConnector<HttpConnector>;
/// A type alias for the Hyper client shared by all adapters.
pub type HttpClient = Client<HttpsConnectorType, Full<Bytes>>;

/// Builds an HTTPS client with native roots. Each adapter owns its own
/// instance; connections are pooled inside the client.
pub fn build_https_client() -> HttpClient {
    // Installing the provider twice is harmless; later calls are rejected.
    _ = CryptoProvider::install_default(default_provider());

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .expect("native certificate roots unavailable")
        .https_only()
        .enable_http1()
        .build();

    Client::builder(TokioExecutor::new()).build(https)
}

/// Drains a response body into a byte buffer alongside its status code.
pub async fn collect_body(
    response: Response<Incoming>,
) -> Result<(hyper::StatusCode, Bytes), hyper::Error> {
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok((status, bytes))
}
