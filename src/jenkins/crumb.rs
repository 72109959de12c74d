//! CSRF crumb acquisition and per-client caching.
//!
//! A [`JenkinsClient`](crate::jenkins::JenkinsClient) resolves its crumb lazily on the first
//! mutating request and keeps it for the rest of its lifetime. The cache sits behind an async
//! mutex that stays locked while the crumb is fetched, so concurrent first requests share one
//! issuer call.

// crates.io
use ::http::{Method, header::SET_COOKIE};
// self
use crate::{
	_prelude::*,
	dispatch::Dispatcher,
	http::{HttpResponse, HttpTransport},
	request::{Query, ResponseBody},
};

/// Well-known crumb issuer endpoint, relative to the Jenkins root.
pub const CRUMB_ISSUER_PATH: &str = "crumbIssuer/api/json";

/// Boxed future returned by [`CrumbProvider::issue`].
pub type CrumbFuture<'a> = Pin<Box<dyn Future<Output = Result<CrumbData>> + 'a + Send>>;

/// CSRF token injected into mutating requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrumbData {
	/// Header carrying the crumb (usually `Jenkins-Crumb`).
	pub header_name: String,
	/// Crumb value.
	pub header_value: String,
	/// `name=value` cookies that must accompany the crumb.
	#[serde(default)]
	pub cookies: Vec<String>,
}

/// Caller-supplied crumb source, for deployments where crumbs come from somewhere other than
/// the issuer endpoint.
pub trait CrumbProvider
where
	Self: Send + Sync,
{
	/// Produces a crumb; errors propagate to the request that needed it.
	fn issue(&self) -> CrumbFuture<'_>;
}
impl<F, Fut> CrumbProvider for F
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<CrumbData>>,
{
	fn issue(&self) -> CrumbFuture<'_> {
		Box::pin(self())
	}
}

/// Where a client obtains its crumb.
#[derive(Clone, Default)]
pub enum CrumbIssuer {
	/// No crumb is ever sent.
	#[default]
	Disabled,
	/// `GET crumbIssuer/api/json` on the client's base URL.
	Endpoint,
	/// A caller-supplied provider.
	Callback(Arc<dyn CrumbProvider>),
}
impl CrumbIssuer {
	/// Wraps a provider (or async closure) as an issuer.
	pub fn callback(provider: impl 'static + CrumbProvider) -> Self {
		Self::Callback(Arc::new(provider))
	}
}
impl Debug for CrumbIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Disabled => f.write_str("CrumbIssuer::Disabled"),
			Self::Endpoint => f.write_str("CrumbIssuer::Endpoint"),
			Self::Callback(_) => f.write_str("CrumbIssuer::Callback(..)"),
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbIssuerResponse {
	crumb_request_field: String,
	crumb: String,
}

/// Crumb cache owned by one client.
#[derive(Debug, Default)]
pub(crate) struct CrumbCache {
	issuer: CrumbIssuer,
	state: AsyncMutex<Option<CrumbData>>,
}
impl CrumbCache {
	pub(crate) fn new(issuer: CrumbIssuer) -> Self {
		Self { issuer, state: AsyncMutex::new(None) }
	}

	/// Returns the cached crumb, fetching it on first use.
	///
	/// A failed endpoint call yields `None` without caching, so a later request tries again.
	pub(crate) async fn resolve<C>(&self, dispatcher: &Dispatcher<C>) -> Result<Option<CrumbData>>
	where
		C: ?Sized + HttpTransport,
	{
		if matches!(self.issuer, CrumbIssuer::Disabled) {
			return Ok(None);
		}

		let mut state = self.state.lock().await;

		if let Some(cached) = state.as_ref() {
			return Ok(Some(cached.clone()));
		}

		let fetched = match &self.issuer {
			CrumbIssuer::Disabled => None,
			CrumbIssuer::Callback(provider) => Some(provider.issue().await?),
			CrumbIssuer::Endpoint => fetch_from_endpoint(dispatcher).await?,
		};

		if let Some(crumb) = &fetched {
			*state = Some(crumb.clone());
		}

		Ok(fetched)
	}

	pub(crate) fn cached(&self) -> Option<CrumbData> {
		self.state.try_lock().and_then(|state| (*state).clone())
	}
}

async fn fetch_from_endpoint<C>(dispatcher: &Dispatcher<C>) -> Result<Option<CrumbData>>
where
	C: ?Sized + HttpTransport,
{
	let url = dispatcher.resolve_url(CRUMB_ISSUER_PATH, &Query::new())?;
	let headers = dispatcher.default_headers().normalize();
	let response = dispatcher.execute(&Method::GET, &url, &headers, Vec::new()).await?;

	if !response.status().is_success() {
		tracing::warn!(
			status = response.status().as_u16(),
			%url,
			"crumb issuer request failed, continuing without a crumb"
		);

		return Ok(None);
	}

	let cookies = session_cookies(&response);
	let body = ResponseBody::Text(String::from_utf8_lossy(response.body()).into_owned());
	let issued: CrumbIssuerResponse = body.into_json()?;

	Ok(Some(CrumbData {
		header_name: issued.crumb_request_field,
		header_value: issued.crumb,
		cookies,
	}))
}

fn session_cookies(response: &HttpResponse) -> Vec<String> {
	response
		.headers()
		.get_all(SET_COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.filter_map(|value| value.split(';').next())
		.map(|pair| pair.trim().to_owned())
		.filter(|pair| !pair.is_empty())
		.collect()
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use ::http::HeaderValue;
	// self
	use super::*;
	use crate::_preludet::*;

	fn dispatcher(transport: &RecordingTransport) -> Dispatcher<RecordingTransport> {
		Dispatcher::new(url("https://ci.example.com"), transport.clone())
	}

	fn issuer_response() -> HttpResponse {
		let mut response = canned_json(
			200,
			serde_json::json!({ "crumbRequestField": "Jenkins-Crumb", "crumb": "abc123" }),
		);

		response
			.headers_mut()
			.append(SET_COOKIE, HeaderValue::from_static("JSESSIONID.1=xyz; Path=/; HttpOnly"));

		response
	}

	#[tokio::test]
	async fn disabled_issuer_never_calls_the_network() {
		let transport = RecordingTransport::new(|_| Some(issuer_response()));
		let dispatcher = dispatcher(&transport);
		let cache = CrumbCache::new(CrumbIssuer::Disabled);

		assert_eq!(cache.resolve(&dispatcher).await.expect("Disabled issuer is infallible."), None);
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn endpoint_crumb_is_fetched_once_and_keeps_session_cookie() {
		let transport = RecordingTransport::new(|_| Some(issuer_response()));
		let dispatcher = dispatcher(&transport);
		let cache = CrumbCache::new(CrumbIssuer::Endpoint);
		let first = cache.resolve(&dispatcher).await.expect("Crumb fetch should succeed.");
		let second = cache.resolve(&dispatcher).await.expect("Cached crumb should be returned.");
		let expected = CrumbData {
			header_name: "Jenkins-Crumb".into(),
			header_value: "abc123".into(),
			cookies: vec!["JSESSIONID.1=xyz".into()],
		};

		assert_eq!(first, Some(expected.clone()));
		assert_eq!(second, Some(expected.clone()));
		assert_eq!(cache.cached(), Some(expected));
		assert_eq!(transport.count_path(CRUMB_ISSUER_PATH), 1);
	}

	#[tokio::test]
	async fn failed_endpoint_is_not_cached() {
		let transport = RecordingTransport::new(|_| Some(canned(404, None, "not found")));
		let dispatcher = dispatcher(&transport);
		let cache = CrumbCache::new(CrumbIssuer::Endpoint);

		assert_eq!(cache.resolve(&dispatcher).await.expect("404 is non-fatal."), None);
		assert_eq!(cache.resolve(&dispatcher).await.expect("404 is non-fatal."), None);
		assert_eq!(transport.count_path(CRUMB_ISSUER_PATH), 2);
	}

	#[tokio::test]
	async fn callback_issuer_is_invoked_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let issuer = CrumbIssuer::callback(move || {
			counter.fetch_add(1, Ordering::SeqCst);

			async {
				Ok::<_, Error>(CrumbData {
					header_name: "X-Crumb".into(),
					header_value: "from-callback".into(),
					cookies: Vec::new(),
				})
			}
		});
		let transport = RecordingTransport::new(|_| None);
		let dispatcher = dispatcher(&transport);
		let cache = CrumbCache::new(issuer);

		for _ in 0..3 {
			let crumb = cache
				.resolve(&dispatcher)
				.await
				.expect("Callback crumb should resolve.")
				.expect("Callback crumb should be present.");

			assert_eq!(crumb.header_value, "from-callback");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(transport.requests().is_empty());
	}
}
