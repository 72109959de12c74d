//! Typed async clients for Jenkins and Argo CD: crumb-aware job/build APIs, multi-instance
//! application lookups, and per-instance session management over an injectable HTTP transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod argocd;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod instance;
pub mod jenkins;
pub mod obs;
pub mod request;
pub mod secret;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// crates.io
	use ::http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
	// self
	use crate::http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture};

	/// Error emitted by [`RecordingTransport`] when the responder has no answer.
	#[derive(Debug, ThisError)]
	#[error("No canned response for {0}.")]
	pub struct ExhaustedTransport(pub String);

	/// Owned snapshot of a request seen by [`RecordingTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Request method.
		pub method: Method,
		/// Full request URL.
		pub url: Url,
		/// Request headers.
		pub headers: HeaderMap,
		/// Raw request body.
		pub body: Vec<u8>,
	}
	impl RecordedRequest {
		fn capture(request: &HttpRequest) -> Self {
			Self {
				method: request.method().clone(),
				url: url(&request.uri().to_string()),
				headers: request.headers().clone(),
				body: request.body().clone(),
			}
		}

		/// Request path without the query.
		pub fn path(&self) -> &str {
			self.url.path()
		}

		/// Header value, if present and printable.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers.get(name).and_then(|value| value.to_str().ok())
		}

		/// Decoded query parameter value.
		pub fn query(&self, key: &str) -> Option<String> {
			self.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
		}

		/// Body as UTF-8 text.
		pub fn body_text(&self) -> String {
			String::from_utf8_lossy(&self.body).into_owned()
		}
	}

	type Responder = dyn Fn(&RecordedRequest) -> Option<HttpResponse> + Send + Sync;

	/// In-process transport that records every request and answers through a responder.
	#[derive(Clone)]
	pub struct RecordingTransport {
		requests: Arc<Mutex<Vec<RecordedRequest>>>,
		responder: Arc<Responder>,
	}
	impl RecordingTransport {
		/// Builds a transport answering each request with the responder's output.
		pub fn new(
			responder: impl Fn(&RecordedRequest) -> Option<HttpResponse> + 'static + Send + Sync,
		) -> Self {
			Self { requests: Default::default(), responder: Arc::new(responder) }
		}

		/// Returns a snapshot of every request seen so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		/// Counts recorded requests whose path ends with `suffix`.
		pub fn count_path(&self, suffix: &str) -> usize {
			self.requests.lock().iter().filter(|req| req.path().ends_with(suffix)).count()
		}
	}
	impl HttpTransport for RecordingTransport {
		type TransportError = ExhaustedTransport;

		fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
			let recorded = RecordedRequest::capture(&request);
			let response = (self.responder)(&recorded);
			let uri = recorded.url.to_string();

			self.requests.lock().push(recorded);

			Box::pin(async move { response.ok_or(ExhaustedTransport(uri)) })
		}
	}

	/// Builds a canned response with an optional content type.
	pub fn canned(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());
		let mut headers = HeaderMap::new();

		if let Some(value) = content_type {
			headers.insert(
				CONTENT_TYPE,
				HeaderValue::from_str(value).expect("Canned content type should be valid."),
			);
		}

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Canned status code should be valid.");
		*response.headers_mut() = headers;

		response
	}

	/// Builds a canned JSON response.
	pub fn canned_json(status: u16, body: Value) -> HttpResponse {
		canned(status, Some("application/json"), &body.to_string())
	}

	/// Parses a URL fixture.
	pub fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
