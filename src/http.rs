//! Transport primitives shared by the Jenkins client and the Argo CD service.
//!
//! The module exposes [`HttpTransport`], the crate's only dependency on an HTTP stack, so
//! callers can inject a preconfigured client (custom TLS roots, proxies, relaxed certificate
//! checks for local development) per client instance instead of mutating process-wide state.
//! [`ReqwestHttpClient`] is the default implementation behind the `reqwest` feature.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::{ConfigError, UNREADABLE_BODY};

/// Fully composed outbound request.
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Raw response handed back by a transport.
pub type HttpResponse = ::http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a single request.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared behind `Arc` across
/// clients, and must return non-2xx responses as `Ok` values; status classification belongs to
/// the dispatcher. A failure to read the body of a non-2xx response should be reported by
/// substituting a placeholder body rather than an error.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends the request and resolves once the full body has been read.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that accepts self-signed or mismatched certificates.
	///
	/// Intended for local development against test clusters; the relaxation applies only to
	/// clients built from this value.
	pub fn insecure() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(reqwest::Request::try_from(request)?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = match response.bytes().await {
				Ok(bytes) => bytes.to_vec(),
				Err(e) if !status.is_success() => {
					tracing::debug!(
						error = %e,
						status = status.as_u16(),
						"failed to read error body"
					);

					UNREADABLE_BODY.as_bytes().to_vec()
				},
				Err(e) => return Err(e),
			};
			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
