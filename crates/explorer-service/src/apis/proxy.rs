//! Object storage proxy.
//!
//! Forwards GET requests to the configured bucket so browsers can read
//! artifacts and listings without cross-origin restrictions. The upstream
//! status is passed through together with the caching headers; transport
//! failures become 502.

use axum::{
	body::Bytes,
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
};
use explorer_types::{object_url, APIError};
use url::Url;

/// Headers copied from the upstream response.
const FORWARDED_HEADERS: [header::HeaderName; 3] =
	[header::CONTENT_TYPE, header::LAST_MODIFIED, header::ETAG];

/// Builds the upstream URL for `path` and the raw query string.
pub fn upstream_url(base: &Url, path: &str, query: Option<&str>) -> Url {
	let mut url = object_url(base, path);
	url.set_query(query.filter(|q| !q.is_empty()));
	url
}

/// Fetches `path` from the bucket at `base`.
pub async fn forward(
	client: &reqwest::Client,
	base: &Url,
	path: &str,
	query: Option<&str>,
) -> Result<Response, APIError> {
	let url = upstream_url(base, path, query);
	tracing::debug!(%url, "Proxying storage request");

	let response = client.get(url.clone()).send().await.map_err(|e| {
		tracing::warn!(%url, error = %e, "Storage proxy request failed");
		APIError::bad_gateway(format!("Storage request failed: {}", e))
	})?;

	let status =
		StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
	let mut headers = HeaderMap::new();
	for name in FORWARDED_HEADERS {
		if let Some(value) = response.headers().get(&name).cloned() {
			headers.insert(name, value);
		}
	}

	let body: Bytes = response.bytes().await.map_err(|e| {
		tracing::warn!(%url, error = %e, "Reading storage proxy response failed");
		APIError::bad_gateway(format!("Storage response failed: {}", e))
	})?;
	Ok((status, headers, body).into_response())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_upstream_url() {
		let base = Url::parse("https://gnosis-dev-dfusion.s3.amazonaws.com/").unwrap();
		assert_eq!(
			upstream_url(&base, "data/a b.json", None).as_str(),
			"https://gnosis-dev-dfusion.s3.amazonaws.com/data/a%20b.json"
		);
		assert_eq!(
			upstream_url(&base, "", Some("list-type=2&prefix=data/&delimiter=/")).as_str(),
			"https://gnosis-dev-dfusion.s3.amazonaws.com/?list-type=2&prefix=data/&delimiter=/"
		);
		assert_eq!(
			upstream_url(&base, "data/x", Some("")).as_str(),
			"https://gnosis-dev-dfusion.s3.amazonaws.com/data/x"
		);
	}
}
