//! Jenkins client: crumb-aware dispatch plus the job and build facades.

pub mod build;
pub mod crumb;
pub mod job;
pub mod path;

pub use build::*;
pub use crumb::*;
pub use job::*;
pub use path::*;

// self
use crate::{
	_prelude::*,
	dispatch::{self, Dispatcher},
	http::HttpTransport,
	instance::{Instance, InstanceRegistry},
	request::{HeaderEntry, RequestOptions, ResponseBody},
	secret::TokenSecret,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Jenkins client specialized for the crate's default reqwest transport.
pub type ReqwestJenkinsClient = JenkinsClient<ReqwestHttpClient>;

/// Client bound to one Jenkins controller.
///
/// Clones share the transport and the crumb cache, so a crumb fetched through one clone is
/// reused by every other.
pub struct JenkinsClient<C>
where
	C: ?Sized + HttpTransport,
{
	dispatcher: Dispatcher<C>,
	crumbs: Arc<CrumbCache>,
}
impl<C> JenkinsClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client for `base_url` that reuses the caller-provided transport.
	///
	/// Crumbs are disabled until [`JenkinsClient::with_crumb_issuer`] is called.
	pub fn with_http_client(base_url: Url, http_client: impl Into<Arc<C>>) -> Self {
		Self { dispatcher: Dispatcher::new(base_url, http_client), crumbs: Default::default() }
	}

	/// Adds or replaces a default header.
	pub fn with_header(mut self, name: impl AsRef<str>, entry: impl Into<HeaderEntry>) -> Self {
		self.dispatcher = self.dispatcher.with_header(name, entry);

		self
	}

	/// Sends `authorization: Basic <username:secret>` with every request.
	pub fn with_basic_auth(self, username: &str, secret: &TokenSecret) -> Self {
		self.with_header("authorization", secret.basic(username))
	}

	/// Replaces the crumb issuer, starting from an empty cache.
	pub fn with_crumb_issuer(mut self, issuer: CrumbIssuer) -> Self {
		self.crumbs = Arc::new(CrumbCache::new(issuer));

		self
	}

	/// Base URL of the controller.
	pub fn base_url(&self) -> &Url {
		self.dispatcher.base_url()
	}

	/// Crumb cached by this client, if one was fetched already.
	pub fn crumb(&self) -> Option<CrumbData> {
		self.crumbs.cached()
	}

	/// Job facade.
	pub fn jobs(&self) -> JobApi<'_, C> {
		JobApi::new(self)
	}

	/// Build facade.
	pub fn builds(&self) -> BuildApi<'_, C> {
		BuildApi::new(self)
	}

	/// Sends a request relative to the base URL.
	///
	/// Mutating methods resolve the crumb first, so the crumb call (if any) always completes
	/// before the protected request leaves.
	pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ResponseBody> {
		let method = options.resolved_method();
		let crumb = if dispatch::is_safe(&method) {
			None
		} else {
			self.crumbs.resolve(&self.dispatcher).await?
		};

		self.dispatcher.send(path, options, crumb.as_ref()).await
	}
}
#[cfg(feature = "reqwest")]
impl JenkinsClient<ReqwestHttpClient> {
	/// Creates a client backed by a fresh reqwest transport.
	pub fn new(base_url: Url) -> Self {
		Self::with_http_client(base_url, ReqwestHttpClient::default())
	}
}
impl<C> Clone for JenkinsClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { dispatcher: self.dispatcher.clone(), crumbs: self.crumbs.clone() }
	}
}
impl<C> Debug for JenkinsClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JenkinsClient")
			.field("base_url", &self.base_url().as_str())
			.field("crumb_cached", &self.crumb().is_some())
			.finish()
	}
}

/// Serde-loadable Jenkins configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsConfig {
	/// Configured controllers.
	pub instances: Vec<Instance>,
	/// Fetches crumbs from `crumbIssuer/api/json` before mutating requests.
	#[serde(default = "default_crumb_issuer")]
	pub crumb_issuer: bool,
}

/// One [`JenkinsClient`] per configured controller.
pub struct JenkinsClients<C>
where
	C: ?Sized + HttpTransport,
{
	registry: InstanceRegistry,
	clients: HashMap<String, JenkinsClient<C>>,
}
impl<C> JenkinsClients<C>
where
	C: ?Sized + HttpTransport,
{
	/// Builds a client per instance, all sharing `http_client`.
	///
	/// Instances with a username authenticate with Basic auth, using the token when present and
	/// the password otherwise.
	pub fn from_config(config: JenkinsConfig, http_client: impl Into<Arc<C>>) -> Result<Self> {
		let http_client = http_client.into();
		let registry = InstanceRegistry::new(config.instances)?;
		let clients = registry
			.iter()
			.map(|instance| {
				let mut client =
					JenkinsClient::<C>::with_http_client(instance.url.clone(), http_client.clone());

				if let (Some(username), Some(secret)) =
					(&instance.username, instance.static_token().or(instance.password.as_ref()))
				{
					client = client.with_basic_auth(username, secret);
				}
				if config.crumb_issuer {
					client = client.with_crumb_issuer(CrumbIssuer::Endpoint);
				}

				(instance.name.clone(), client)
			})
			.collect();

		Ok(Self { registry, clients })
	}

	/// Client for the named controller.
	pub fn client(&self, name: &str) -> Result<&JenkinsClient<C>> {
		let instance = self.registry.find(name)?;

		self.clients
			.get(&instance.name)
			.ok_or_else(|| Error::InstanceNotFound { name: name.to_owned() })
	}

	/// Configured controllers in configuration order.
	pub fn instances(&self) -> impl Iterator<Item = &Instance> {
		self.registry.iter()
	}
}
impl<C> Debug for JenkinsClients<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JenkinsClients").field("registry", &self.registry).finish()
	}
}

fn default_crumb_issuer() -> bool {
	true
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn config(crumb_issuer: bool) -> JenkinsConfig {
		serde_json::from_value(serde_json::json!({
			"instances": [
				{
					"name": "main",
					"url": "https://ci.example.com",
					"username": "bot",
					"token": "t0k"
				},
				{ "name": "legacy", "url": "https://legacy.example.com" }
			],
			"crumbIssuer": crumb_issuer
		}))
		.expect("Config fixture should deserialize.")
	}

	#[test]
	fn crumb_issuer_defaults_to_enabled() {
		let parsed: JenkinsConfig = serde_json::from_value(serde_json::json!({ "instances": [] }))
			.expect("Minimal config should deserialize.");

		assert!(parsed.crumb_issuer);
	}

	#[tokio::test]
	async fn configured_clients_send_basic_auth_and_fetch_crumbs() {
		let transport = RecordingTransport::new(|req| match req.path() {
			"/crumbIssuer/api/json" => Some(canned_json(
				200,
				serde_json::json!({ "crumbRequestField": "Jenkins-Crumb", "crumb": "c" }),
			)),
			_ => Some(canned(201, None, "")),
		});
		let clients: JenkinsClients<RecordingTransport> =
			JenkinsClients::from_config(config(true), transport.clone())
				.expect("Config should produce clients.");
		let main = clients.client("main").expect("Main is configured.");

		main.jobs().enable("app").await.expect("Enable should succeed.");

		let requests = transport.requests();
		let enable = requests.last().expect("Enable request should be recorded.");

		assert_eq!(enable.path(), "/job/app/enable");
		assert_eq!(enable.header("authorization"), Some("Basic Ym90OnQwaw=="));
		assert_eq!(enable.header("jenkins-crumb"), Some("c"));
		assert_eq!(clients.instances().count(), 2);
	}

	#[tokio::test]
	async fn unknown_instances_fail_with_not_found() {
		let transport = RecordingTransport::new(|_| None);
		let clients: JenkinsClients<RecordingTransport> =
			JenkinsClients::from_config(config(false), transport)
				.expect("Config should produce clients.");
		let err = clients.client("missing").expect_err("Unknown names should fail.");

		assert!(matches!(err, Error::InstanceNotFound { .. }));
		assert!(clients.client("legacy").expect("Legacy is configured.").crumb().is_none());
	}
}
