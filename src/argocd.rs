//! Argo CD service: multi-instance application lookups, project and application management,
//! and per-instance session handling.

pub mod apps;
pub mod model;
pub mod resources;
pub mod session;

pub use model::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	dispatch::Dispatcher,
	http::HttpTransport,
	instance::{Instance, InstanceRegistry},
	request::JSON_CONTENT_TYPE,
	secret::TokenSecret,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Argo CD service specialized for the crate's default reqwest transport.
pub type ReqwestArgoCdService = ArgoCdService<ReqwestHttpClient>;

/// Serde-loadable Argo CD configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCdConfig {
	/// Configured API servers.
	pub instances: Vec<Instance>,
	/// Username used by instances without their own.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// Password used by instances without their own.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<TokenSecret>,
	/// Lifetime of cached session tokens, in seconds; tokens are not cached when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_ttl_secs: Option<u32>,
}

/// Client for every configured Argo CD instance.
///
/// Each operation names its instance, resolves an [`AuthSession`] for it, and then talks to
/// that instance only; [`ArgoCdService::find_applications`] fans out to all of them.
pub struct ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	http_client: Arc<C>,
	instances: InstanceRegistry,
	username: Option<String>,
	password: Option<TokenSecret>,
	sessions: Arc<SessionCache>,
}
impl<C> ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a service over `instances` that reuses the caller-provided transport.
	pub fn with_http_client(instances: InstanceRegistry, http_client: impl Into<Arc<C>>) -> Self {
		Self {
			http_client: http_client.into(),
			instances,
			username: None,
			password: None,
			sessions: Default::default(),
		}
	}

	/// Builds a service from configuration.
	pub fn from_config(config: ArgoCdConfig, http_client: impl Into<Arc<C>>) -> Result<Self> {
		let registry = InstanceRegistry::new(config.instances)?;
		let mut service = Self::with_http_client(registry, http_client);

		service.username = config.username;
		service.password = config.password;

		if let Some(secs) = config.session_ttl_secs {
			service = service.with_session_ttl(Duration::seconds(secs.into()));
		}

		Ok(service)
	}

	/// Sets the credentials used by instances that carry none.
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<TokenSecret>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(password.into());

		self
	}

	/// Caches issued session tokens for `ttl`, starting from an empty cache.
	pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
		self.sessions = Arc::new(SessionCache::with_ttl(ttl));

		self
	}

	/// Configured instances in configuration order.
	pub fn instances(&self) -> impl Iterator<Item = &Instance> {
		self.instances.iter()
	}

	/// Instance record for `name`.
	pub fn instance(&self, name: &str) -> Result<&Instance> {
		self.instances.find(name)
	}

	/// Dispatcher authenticated for one instance.
	fn dispatcher(&self, instance: &Instance, session: &AuthSession) -> Dispatcher<C> {
		Dispatcher::<C>::new(instance.url.clone(), self.http_client.clone())
			.with_header("accept", JSON_CONTENT_TYPE)
			.with_header("authorization", session.bearer())
	}

	/// Resolves the instance and its session, then builds the dispatcher for it.
	async fn connect(&self, instance_name: &str) -> Result<(&Instance, Dispatcher<C>)> {
		let instance = self.instances.find(instance_name)?;
		let session = self.session(instance_name).await?;

		Ok((instance, self.dispatcher(instance, &session)))
	}
}
#[cfg(feature = "reqwest")]
impl ArgoCdService<ReqwestHttpClient> {
	/// Creates a service backed by a fresh reqwest transport.
	pub fn new(instances: InstanceRegistry) -> Self {
		Self::with_http_client(instances, ReqwestHttpClient::default())
	}
}
impl<C> Clone for ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			instances: self.instances.clone(),
			username: self.username.clone(),
			password: self.password.clone(),
			sessions: self.sessions.clone(),
		}
	}
}
impl<C> Debug for ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ArgoCdService")
			.field("instances", &self.instances.iter().map(|i| i.name.as_str()).collect::<Vec<_>>())
			.field("username", &self.username)
			.field("password_set", &self.password.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn config_loads_defaults_and_ttl() {
		let config: ArgoCdConfig = serde_json::from_value(serde_json::json!({
			"instances": [{ "name": "prod", "url": "https://argocd.example.com" }],
			"username": "admin",
			"password": "secret",
			"sessionTtlSecs": 600
		}))
		.expect("Config fixture should deserialize.");
		let transport = RecordingTransport::new(|_| None);
		let service: ArgoCdService<RecordingTransport> =
			ArgoCdService::from_config(config, transport).expect("Config should validate.");
		let debug = format!("{service:?}");

		assert_eq!(service.instance("prod").expect("Prod is configured.").name, "prod");
		assert!(debug.contains("password_set: true"));
		assert!(!debug.contains("secret"));
	}

	#[test]
	fn duplicate_instances_are_rejected() {
		let config: ArgoCdConfig = serde_json::from_value(serde_json::json!({
			"instances": [
				{ "name": "prod", "url": "https://a.example.com" },
				{ "name": "prod", "url": "https://b.example.com" }
			]
		}))
		.expect("Config fixture should deserialize.");
		let transport = RecordingTransport::new(|_| None);

		assert!(ArgoCdService::<RecordingTransport>::from_config(config, transport).is_err());
	}
}
