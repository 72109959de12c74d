//! Argo CD session resolution.
//!
//! Instances configured with a static token never reach the session endpoint. Every other
//! instance exchanges a username and password for a bearer token through
//! `POST /api/v1/session`. Tokens are fetched on every resolution unless the service was built
//! with [`ArgoCdService::with_session_ttl`], in which case one [`AuthSession`] per instance is
//! kept until it expires and a per-instance guard makes concurrent callers share one fetch.

// self
use crate::{
	_prelude::*,
	argocd::ArgoCdService,
	dispatch::Dispatcher,
	error::ResponseShapeError,
	http::HttpTransport,
	instance::Instance,
	request::{JSON_CONTENT_TYPE, RequestOptions},
	secret::TokenSecret,
};

/// Session endpoint, relative to the instance URL.
pub const SESSION_PATH: &str = "api/v1/session";

/// Where a session token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
	/// Configured on the instance.
	Static,
	/// Issued by the session endpoint.
	Issued,
}

/// Bearer token resolved for one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
	/// Instance the token belongs to.
	pub instance: String,
	/// Bearer token.
	pub token: TokenSecret,
	/// Origin of the token.
	pub source: TokenSource,
	/// Resolution time.
	pub issued_at: OffsetDateTime,
	/// Expiry after which a cached session is fetched again; `None` never expires.
	pub expires_at: Option<OffsetDateTime>,
}
impl AuthSession {
	/// Whether the session is past its expiry at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}

	/// `authorization` header value.
	pub fn bearer(&self) -> String {
		self.token.bearer()
	}
}

#[derive(Serialize)]
struct SessionRequest<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
	#[serde(default)]
	token: Option<String>,
}

/// Per-service session cache; disabled when `ttl` is `None`.
#[derive(Debug, Default)]
pub(crate) struct SessionCache {
	ttl: Option<Duration>,
	entries: Mutex<HashMap<String, AuthSession>>,
	guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl SessionCache {
	pub(crate) fn with_ttl(ttl: Duration) -> Self {
		Self { ttl: Some(ttl), ..Default::default() }
	}

	fn guard(&self, instance: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(instance.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn fresh(&self, instance: &str, now: OffsetDateTime) -> Option<AuthSession> {
		self.entries.lock().get(instance).filter(|session| !session.is_expired_at(now)).cloned()
	}

	fn store(&self, session: AuthSession) {
		self.entries.lock().insert(session.instance.clone(), session);
	}

	pub(crate) fn invalidate(&self, instance: &str) -> bool {
		self.entries.lock().remove(instance).is_some()
	}
}

impl<C> ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	/// Resolves the bearer token for the named instance.
	pub async fn session(&self, instance_name: &str) -> Result<AuthSession> {
		let instance = self.instances.find(instance_name)?;
		let now = OffsetDateTime::now_utc();

		if let Some(token) = instance.static_token() {
			return Ok(AuthSession {
				instance: instance.name.clone(),
				token: token.clone(),
				source: TokenSource::Static,
				issued_at: now,
				expires_at: None,
			});
		}

		let Some(ttl) = self.sessions.ttl else {
			return self.issue_session(instance, None).await;
		};
		let guard = self.sessions.guard(&instance.name);
		let _singleflight = guard.lock().await;

		if let Some(cached) = self.sessions.fresh(&instance.name, OffsetDateTime::now_utc()) {
			return Ok(cached);
		}

		let session = self.issue_session(instance, Some(ttl)).await?;

		self.sessions.store(session.clone());

		Ok(session)
	}

	/// Drops the cached session of the named instance; returns whether one was cached.
	pub fn invalidate_session(&self, instance_name: &str) -> bool {
		self.sessions.invalidate(instance_name)
	}

	async fn issue_session(
		&self,
		instance: &Instance,
		ttl: Option<Duration>,
	) -> Result<AuthSession> {
		let username = instance.username.as_deref().or(self.username.as_deref());
		let password = instance.password.as_ref().or(self.password.as_ref());
		let (Some(username), Some(password)) = (username, password) else {
			return Err(Error::Authentication {
				message: format!(
					"Missing credentials for Argo CD instance `{}`; configure a token or a \
					 username and password",
					instance.name
				),
			});
		};
		let dispatcher = Dispatcher::<C>::new(instance.url.clone(), self.http_client.clone())
			.with_header("accept", JSON_CONTENT_TYPE);
		let options = RequestOptions::post()
			.json(&SessionRequest { username, password: password.expose() })?;
		let context = format!("Failed to get an Argo CD token for `{}`", instance.name);
		let body =
			dispatcher.send(SESSION_PATH, options, None).await.map_err(|e| e.context(context))?;
		let response: SessionResponse = body.into_json()?;
		let token = response.token.filter(|token| !token.is_empty()).ok_or_else(|| {
			ResponseShapeError::MissingField {
				endpoint: format!("{}{SESSION_PATH}", instance.url),
				field: "token",
			}
		})?;
		let issued_at = OffsetDateTime::now_utc();

		tracing::debug!(instance = %instance.name, "issued Argo CD session token");

		Ok(AuthSession {
			instance: instance.name.clone(),
			token: TokenSecret::new(token),
			source: TokenSource::Issued,
			issued_at,
			expires_at: ttl.map(|ttl| issued_at + ttl),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, instance::InstanceRegistry};

	fn service(
		transport: &RecordingTransport,
		instances: Vec<Instance>,
	) -> ArgoCdService<RecordingTransport> {
		let registry = InstanceRegistry::new(instances).expect("Fixture instances are valid.");

		ArgoCdService::with_http_client(registry, transport.clone())
	}

	fn prod() -> Instance {
		Instance::new("prod", url("https://argocd.example.com"))
	}

	fn issuing() -> RecordingTransport {
		RecordingTransport::new(|_| {
			Some(canned_json(200, serde_json::json!({ "token": "issued" })))
		})
	}

	#[tokio::test]
	async fn static_tokens_skip_the_session_endpoint() {
		let transport = issuing();
		let service = service(&transport, vec![prod().with_token("static")]);
		let session = service.session("prod").await.expect("Static sessions always resolve.");

		assert_eq!(session.source, TokenSource::Static);
		assert_eq!(session.bearer(), "Bearer static");
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn instance_credentials_win_over_service_defaults() {
		let transport = issuing();
		let instance = prod().with_credentials("instance-user", "instance-pass");
		let service = service(&transport, vec![instance])
			.with_credentials("default-user", "default-pass");
		let session = service.session("prod").await.expect("Session should be issued.");
		let request = &transport.requests()[0];
		let body: Value = serde_json::from_slice(&request.body).expect("Session body is JSON.");

		assert_eq!(session.source, TokenSource::Issued);
		assert_eq!(session.token.expose(), "issued");
		assert_eq!(request.path(), "/api/v1/session");
		assert_eq!(
			body,
			serde_json::json!({ "username": "instance-user", "password": "instance-pass" })
		);
	}

	#[tokio::test]
	async fn missing_credentials_fail_without_network() {
		let transport = issuing();
		let service = service(&transport, vec![prod()]);
		let err = service.session("prod").await.expect_err("No credentials means no session.");

		assert!(matches!(err, Error::Authentication { .. }));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn rejected_credentials_are_authentication_errors() {
		let transport = RecordingTransport::new(|_| Some(canned(401, None, "invalid session")));
		let service = service(&transport, vec![prod().with_credentials("u", "p")]);
		let err = service.session("prod").await.expect_err("401 should fail.");

		assert!(matches!(err, Error::Authentication { .. }));
		assert!(err.to_string().contains("401"));
	}

	#[tokio::test]
	async fn missing_token_is_a_response_shape_error() {
		let transport = RecordingTransport::new(|_| Some(canned_json(200, serde_json::json!({}))));
		let service = service(&transport, vec![prod().with_credentials("u", "p")]);
		let err = service.session("prod").await.expect_err("Tokenless responses should fail.");

		assert!(matches!(err, Error::ResponseShape(ResponseShapeError::MissingField { .. })));
	}

	#[tokio::test]
	async fn sessions_are_fetched_every_time_without_ttl() {
		let transport = issuing();
		let service = service(&transport, vec![prod().with_credentials("u", "p")]);

		service.session("prod").await.expect("First session should be issued.");
		service.session("prod").await.expect("Second session should be issued.");

		assert_eq!(transport.count_path(SESSION_PATH), 2);
	}

	#[tokio::test]
	async fn ttl_cache_reuses_and_invalidates_sessions() {
		let transport = issuing();
		let service = service(&transport, vec![prod().with_credentials("u", "p")])
			.with_session_ttl(Duration::minutes(10));
		let (a, b) = futures::join!(service.session("prod"), service.session("prod"));
		let a = a.expect("Concurrent session should resolve.");
		let b = b.expect("Concurrent session should resolve.");

		assert_eq!(a, b);
		assert!(a.expires_at.is_some());
		assert_eq!(transport.count_path(SESSION_PATH), 1);
		assert!(service.invalidate_session("prod"));

		service.session("prod").await.expect("Session should be issued again.");

		assert_eq!(transport.count_path(SESSION_PATH), 2);
	}

	#[test]
	fn expiry_is_inclusive() {
		let now = OffsetDateTime::now_utc();
		let session = AuthSession {
			instance: "prod".into(),
			token: "t".into(),
			source: TokenSource::Issued,
			issued_at: now,
			expires_at: Some(now),
		};

		assert!(session.is_expired_at(now));
		assert!(!session.is_expired_at(now - Duration::seconds(1)));
	}
}
