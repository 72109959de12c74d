//! Request dispatcher: URL composition, header layering, transport call, and response
//! classification for a single base URL.

// crates.io
use ::http::{Method, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ResponseShapeError, TransportError, UNREADABLE_BODY, UpstreamError},
	http::{HttpResponse, HttpTransport},
	jenkins::CrumbData,
	request::{Headers, HeaderEntry, Query, RequestBody, RequestOptions, ResponseBody},
};

/// Executes requests against one base URL through an injected transport.
///
/// Default headers always carry `referer: <base url>`; callers add their own (authorization,
/// accept, ...) through [`Dispatcher::with_header`].
pub struct Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	base_url: Url,
	default_headers: Headers,
	http_client: Arc<C>,
}
impl<C> Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a dispatcher for `base_url` sending through `http_client`.
	pub fn new(base_url: Url, http_client: impl Into<Arc<C>>) -> Self {
		let default_headers = Headers::new().with("referer", base_url.as_str());

		Self { base_url, default_headers, http_client: http_client.into() }
	}

	/// Adds or replaces a default header sent with every request.
	pub fn with_header(mut self, name: impl AsRef<str>, entry: impl Into<HeaderEntry>) -> Self {
		self.default_headers.set(name, entry);

		self
	}

	/// Base URL every path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Headers sent with every request.
	pub fn default_headers(&self) -> &Headers {
		&self.default_headers
	}

	/// Joins the base URL and `path` with exactly one slash and appends `query`.
	pub fn resolve_url(&self, path: &str, query: &Query) -> Result<Url> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');
		let raw = format!("{base}/{path}");
		let mut url = Url::parse(&raw)
			.map_err(|source| ConfigError::InvalidUrl { url: raw.clone(), source })?;

		if !query.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in query.iter() {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}

	/// Layers defaults, caller headers, crumb headers (mutating methods only), and the content
	/// type, then flattens the result for the wire.
	pub fn compose_headers(
		&self,
		method: &Method,
		options: &RequestOptions,
		crumb: Option<&CrumbData>,
	) -> Vec<(String, String)> {
		let mut headers = self.default_headers.clone();

		headers.merge(&options.headers);

		if !is_safe(method) {
			if let Some(crumb) = crumb {
				headers.set(&crumb.header_name, crumb.header_value.as_str());

				if !crumb.cookies.is_empty() {
					let joined = crumb.cookies.join("; ");
					let cookie = match headers.get("cookie").and_then(HeaderEntry::flatten) {
						Some(prior) if !prior.is_empty() => format!("{prior}; {joined}"),
						_ => joined,
					};

					headers.set("cookie", cookie);
				}
			}
		}

		let implied = options.body.as_ref().and_then(RequestBody::implied_content_type);
		let content_type = options.content_type.clone().or_else(|| implied.map(Into::into));

		if let Some(content_type) = content_type {
			headers.set("content-type", content_type);
		}

		headers.normalize()
	}

	/// Sends one request and classifies the response.
	///
	/// Non-2xx statuses become [`UpstreamError`]s (classified into authentication, not-allowed,
	/// and not-found errors where the status allows); successful bodies become
	/// [`ResponseBody::Json`] when the response announces JSON and `raw_text` is not set.
	pub async fn send(
		&self,
		path: &str,
		options: RequestOptions,
		crumb: Option<&CrumbData>,
	) -> Result<ResponseBody> {
		let raw_text = options.raw_text;
		let exchange = self.exchange(path, options, crumb).await?;

		if !exchange.response.status().is_success() {
			return Err(exchange.into_upstream_error().into());
		}

		exchange.into_body(raw_text)
	}

	/// Validates, composes, and sends a request, returning the response whatever its status.
	pub(crate) async fn exchange(
		&self,
		path: &str,
		options: RequestOptions,
		crumb: Option<&CrumbData>,
	) -> Result<Exchange> {
		let method = options.resolved_method();

		if options.body.is_some() && is_safe(&method) {
			return Err(Error::invalid_argument(format!("{method} requests cannot carry a body")));
		}

		let url = self.resolve_url(path, &options.query)?;
		let headers = self.compose_headers(&method, &options, crumb);
		let body = options.body.as_ref().map(RequestBody::encode).transpose()?.unwrap_or_default();
		let response = self.execute(&method, &url, &headers, body).await?;

		Ok(Exchange { method, url, response })
	}

	/// Sends a fully composed request without classifying the status.
	pub(crate) async fn execute(
		&self,
		method: &Method,
		url: &Url,
		headers: &[(String, String)],
		body: Vec<u8>,
	) -> Result<HttpResponse> {
		let mut builder = ::http::Request::builder().method(method.clone()).uri(url.as_str());

		for (name, value) in headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		let request = builder.body(body).map_err(ConfigError::from)?;

		tracing::debug!(%method, %url, "dispatching request");

		self.http_client
			.send(request)
			.await
			.map_err(|e| TransportError::network(url.as_str(), e).into())
	}
}
impl<C> Clone for Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			base_url: self.base_url.clone(),
			default_headers: self.default_headers.clone(),
			http_client: self.http_client.clone(),
		}
	}
}
impl<C> Debug for Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher").field("base_url", &self.base_url.as_str()).finish()
	}
}

/// Response paired with the request line that produced it.
#[derive(Debug)]
pub(crate) struct Exchange {
	pub(crate) method: Method,
	pub(crate) url: Url,
	pub(crate) response: HttpResponse,
}
impl Exchange {
	/// Builds the error for a non-2xx response, never failing on an unreadable body.
	pub(crate) fn into_upstream_error(self) -> UpstreamError {
		upstream_error(&self.method, &self.url, self.response)
	}

	/// Classifies a successful response body.
	pub(crate) fn into_body(self, raw_text: bool) -> Result<ResponseBody> {
		classify(self.response, raw_text)
	}
}

/// Methods that never carry a crumb or a body.
pub(crate) fn is_safe(method: &Method) -> bool {
	*method == Method::GET || *method == Method::HEAD
}

/// Builds the error for a non-2xx response, never failing on an unreadable body.
fn upstream_error(method: &Method, url: &Url, response: HttpResponse) -> UpstreamError {
	let status = response.status().as_u16();
	let body = String::from_utf8(response.into_body()).unwrap_or_else(|_| UNREADABLE_BODY.into());

	UpstreamError { status, method: method.to_string(), url: url.to_string(), body }
}

/// Whether the response announces a JSON payload.
fn is_json(response: &HttpResponse) -> bool {
	response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(|value| value.to_ascii_lowercase().contains("application/json"))
		.unwrap_or(false)
}

fn classify(response: HttpResponse, raw_text: bool) -> Result<ResponseBody> {
	let json = is_json(&response);
	let text = String::from_utf8_lossy(response.body()).into_owned();

	if raw_text || !json || text.trim().is_empty() {
		return Ok(ResponseBody::Text(text));
	}

	let mut de = serde_json::Deserializer::from_str(&text);
	let value = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ResponseShapeError::Decode { source })?;

	Ok(ResponseBody::Json(value))
}
