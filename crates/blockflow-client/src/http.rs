//! Response handling shared by the resource and dashboard clients.

use blockflow_core::error::TRANSPORT_ERROR_STATUS;
use blockflow_core::{ApiError, BlockflowError, Result};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Append path segments to `base`, percent-encoding each one.
///
/// An empty trailing segment yields a trailing slash (`/blocks/`).
pub(crate) fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BlockflowError::Config(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse and validate a base URL.
pub(crate) fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| BlockflowError::Config(format!("invalid URL {raw:?}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BlockflowError::Config(format!(
            "unsupported URL scheme {other:?} in {raw:?}"
        ))),
    }
}

/// Send a request and decode a 2xx JSON body, normalizing every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    method: &Method,
    url: &Url,
) -> Result<T> {
    debug!(%method, path = url.path(), "Sending request");

    let response = request.send().await.map_err(|e| {
        warn!(%method, path = url.path(), error = %e, "Request failed without a response");
        BlockflowError::from(ApiError::transport())
    })?;

    decode(response, method, url).await
}

async fn decode<T: DeserializeOwned>(response: Response, method: &Method, url: &Url) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_response(status.as_u16(), &body);
        warn!(%method, path = url.path(), status = status.as_u16(), message = %err.message, "Request rejected");
        return Err(err.into());
    }

    response.json::<T>().await.map_err(|e| {
        warn!(%method, path = url.path(), error = %e, "Undecodable response body");
        ApiError::new(format!("Invalid response body: {e}"), TRANSPORT_ERROR_STATUS).into()
    })
}
