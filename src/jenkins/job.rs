//! Job operations: inspection, triggering, copying, creation, and lifecycle toggles.

// self
use crate::{
	_prelude::*,
	http::HttpTransport,
	jenkins::{JenkinsClient, JobPath},
	obs::{self, Call},
	request::{JSON_CONTENT_TYPE, RequestBody, RequestOptions, XML_CONTENT_TYPE},
};

/// Field selection used by [`JobApi::get_builds`] when the caller passes none.
pub const DEFAULT_BUILDS_TREE: &str =
	"builds[number,url,result,building,timestamp,duration,displayName]";

/// Job lookup with optional `tree` and `depth` selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobQuery {
	/// Job to inspect.
	pub path: JobPath,
	/// Jenkins `tree` field-selection expression.
	pub tree: Option<String>,
	/// Jenkins `depth` parameter.
	pub depth: Option<u32>,
}
impl JobQuery {
	/// Queries `path` without selectors.
	pub fn new(path: impl Into<JobPath>) -> Self {
		Self { path: path.into(), tree: None, depth: None }
	}

	/// Sets the `tree` selector.
	pub fn with_tree(mut self, tree: impl Into<String>) -> Self {
		self.tree = Some(tree.into());

		self
	}

	/// Sets the `depth` selector.
	pub fn with_depth(mut self, depth: u32) -> Self {
		self.depth = Some(depth);

		self
	}
}
impl From<JobPath> for JobQuery {
	fn from(path: JobPath) -> Self {
		Self::new(path)
	}
}
impl From<&str> for JobQuery {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}
impl From<String> for JobQuery {
	fn from(path: String) -> Self {
		Self::new(path)
	}
}
impl From<Vec<String>> for JobQuery {
	fn from(path: Vec<String>) -> Self {
		Self::new(path)
	}
}
impl<const N: usize> From<[&str; N]> for JobQuery {
	fn from(path: [&str; N]) -> Self {
		Self::new(path)
	}
}

/// Parameters for [`JobApi::build`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildOptions {
	/// Build parameters, sent as a form body.
	pub parameters: BTreeMap<String, String>,
	/// Remote trigger token, sent as the `token` query parameter.
	pub token: Option<String>,
	/// Quiet period such as `0sec`, sent as the `delay` query parameter.
	pub delay: Option<String>,
}
impl BuildOptions {
	/// Options without parameters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a build parameter.
	pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.parameters.insert(name.into(), value.into());

		self
	}

	/// Sets the remote trigger token.
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());

		self
	}

	/// Sets the quiet period.
	pub fn with_delay(mut self, delay: impl Into<String>) -> Self {
		self.delay = Some(delay.into());

		self
	}
}

/// Summary of one build as listed by [`JobApi::get_builds`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
	/// Build number.
	#[serde(default)]
	pub number: Option<u64>,
	/// Absolute build URL.
	#[serde(default)]
	pub url: Option<String>,
	/// Final result (`SUCCESS`, `FAILURE`, ...); absent while building.
	#[serde(default)]
	pub result: Option<String>,
	/// Whether the build is still running.
	#[serde(default)]
	pub building: Option<bool>,
	/// Start time in milliseconds since the epoch.
	#[serde(default)]
	pub timestamp: Option<i64>,
	/// Duration in milliseconds.
	#[serde(default)]
	pub duration: Option<i64>,
	/// Display name such as `#42`.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Fields selected by a custom `tree`.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct BuildsEnvelope {
	#[serde(default)]
	builds: Option<Vec<BuildSummary>>,
}

/// Job facade borrowed from a [`JenkinsClient`].
#[derive(Debug)]
pub struct JobApi<'a, C>
where
	C: ?Sized + HttpTransport,
{
	client: &'a JenkinsClient<C>,
}
impl<'a, C> JobApi<'a, C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) fn new(client: &'a JenkinsClient<C>) -> Self {
		Self { client }
	}

	/// `GET <job>/api/json`, with `tree` and `depth` only when set.
	pub async fn get(&self, query: impl Into<JobQuery>) -> Result<Value> {
		let query = query.into();

		obs::observe(Call::jenkins("job.get"), async move {
			let path = format!("{}/api/json", query.path.normalize()?);
			let options = RequestOptions::get()
				.header("accept", JSON_CONTENT_TYPE)
				.query_opt("tree", query.tree)
				.query_opt("depth", query.depth);

			self.client.request(&path, options).await?.into_json()
		})
		.await
	}

	/// Lists the builds of a job; `tree` defaults to [`DEFAULT_BUILDS_TREE`].
	///
	/// A job without a `builds` field yields an empty list.
	pub async fn get_builds(
		&self,
		path: impl Into<JobPath>,
		tree: Option<&str>,
	) -> Result<Vec<BuildSummary>> {
		let path = path.into();

		obs::observe(Call::jenkins("job.get_builds"), async move {
			let endpoint = format!("{}/api/json", path.normalize()?);
			let options = RequestOptions::get()
				.header("accept", JSON_CONTENT_TYPE)
				.query("tree", tree.unwrap_or(DEFAULT_BUILDS_TREE));
			let envelope: BuildsEnvelope =
				self.client.request(&endpoint, options).await?.into_json()?;

			Ok(envelope.builds.unwrap_or_default())
		})
		.await
	}

	/// Triggers a build.
	///
	/// Non-empty parameters go to `buildWithParameters` as a form body; otherwise `build` is
	/// called without a body. `token` and `delay` always travel in the query.
	pub async fn build(&self, path: impl Into<JobPath>, options: BuildOptions) -> Result<()> {
		let path = path.into();

		obs::observe(Call::jenkins("job.build"), async move {
			let job = path.normalize()?;
			let BuildOptions { parameters, token, delay } = options;
			let request =
				RequestOptions::post().query_opt("token", token).query_opt("delay", delay);
			let (endpoint, request) = if parameters.is_empty() {
				(format!("{job}/build"), request)
			} else {
				(format!("{job}/buildWithParameters"), request.body(RequestBody::Form(parameters)))
			};

			self.client.request(&endpoint, request).await?;

			Ok(())
		})
		.await
	}

	/// Copies `from` into `path`.
	///
	/// `from` is sent verbatim: Jenkins expects the slash-delimited full name there, not the
	/// `job/` form.
	pub async fn copy(&self, path: impl Into<JobPath>, from: &str) -> Result<()> {
		let path = path.into();

		obs::observe(Call::jenkins("job.copy"), async move {
			let (endpoint, name) = create_item_route(&path)?;
			let options = RequestOptions::post()
				.query("name", name)
				.query("mode", "copy")
				.query("from", from);

			self.client.request(&endpoint, options).await?;

			Ok(())
		})
		.await
	}

	/// Creates `path` from a `config.xml` document.
	pub async fn create(&self, path: impl Into<JobPath>, xml: impl Into<String>) -> Result<()> {
		let path = path.into();
		let xml = xml.into();

		obs::observe(Call::jenkins("job.create"), async move {
			let (endpoint, name) = create_item_route(&path)?;
			let options = RequestOptions::post()
				.query("name", name)
				.body(RequestBody::Text(xml))
				.content_type(XML_CONTENT_TYPE);

			self.client.request(&endpoint, options).await?;

			Ok(())
		})
		.await
	}

	/// `POST <job>/doDelete`.
	pub async fn destroy(&self, path: impl Into<JobPath>) -> Result<()> {
		self.post_action(path.into(), "doDelete", "job.destroy").await
	}

	/// `POST <job>/enable`.
	pub async fn enable(&self, path: impl Into<JobPath>) -> Result<()> {
		self.post_action(path.into(), "enable", "job.enable").await
	}

	/// `POST <job>/disable`.
	pub async fn disable(&self, path: impl Into<JobPath>) -> Result<()> {
		self.post_action(path.into(), "disable", "job.disable").await
	}

	/// Fetches the job's `config.xml` verbatim.
	pub async fn config_xml(&self, path: impl Into<JobPath>) -> Result<String> {
		let path = path.into();

		obs::observe(Call::jenkins("job.config_xml"), async move {
			let endpoint = format!("{}/config.xml", path.normalize()?);
			let body = self.client.request(&endpoint, RequestOptions::get().raw_text()).await?;

			Ok(body.into_text())
		})
		.await
	}

	async fn post_action(
		&self,
		path: JobPath,
		action: &'static str,
		operation: &'static str,
	) -> Result<()> {
		obs::observe(Call::jenkins(operation), async move {
			let endpoint = format!("{}/{action}", path.normalize()?);

			self.client.request(&endpoint, RequestOptions::post()).await?;

			Ok(())
		})
		.await
	}
}

/// `[<parents>/]createItem` plus the leaf name for copy and create.
fn create_item_route(path: &JobPath) -> Result<(String, String)> {
	let name = path.leaf()?;
	let parents = path.parents()?;
	let endpoint = if parents.is_empty() {
		"createItem".to_owned()
	} else {
		format!("{}/createItem", JobPath::Segments(parents).normalize()?)
	};

	Ok((endpoint, name))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, jenkins::CrumbIssuer};

	fn client(transport: &RecordingTransport) -> JenkinsClient<RecordingTransport> {
		JenkinsClient::with_http_client(url("https://ci.example.com/"), transport.clone())
	}

	fn created() -> RecordingTransport {
		RecordingTransport::new(|req| match req.path() {
			"/crumbIssuer/api/json" => Some(canned_json(
				200,
				serde_json::json!({ "crumbRequestField": "Jenkins-Crumb", "crumb": "c0ffee" }),
			)),
			_ => Some(canned(201, None, "")),
		})
	}

	#[tokio::test]
	async fn build_with_parameters_posts_a_form() {
		let transport = created();

		client(&transport)
			.jobs()
			.build("folder/app", BuildOptions::new().parameter("A", "1").with_delay("0sec"))
			.await
			.expect("Parameterized build should be triggered.");

		let request = &transport.requests()[0];

		assert_eq!(request.method, ::http::Method::POST);
		assert_eq!(request.path(), "/job/folder/job/app/buildWithParameters");
		assert_eq!(request.query("delay").as_deref(), Some("0sec"));
		assert_eq!(request.body_text(), "A=1");
		assert_eq!(request.header("content-type"), Some(crate::request::FORM_CONTENT_TYPE));
	}

	#[tokio::test]
	async fn build_without_parameters_has_no_body() {
		let transport = created();

		client(&transport)
			.jobs()
			.build(["folder", "app"], BuildOptions::new().with_token("remote"))
			.await
			.expect("Plain build should be triggered.");

		let request = &transport.requests()[0];

		assert_eq!(request.path(), "/job/folder/job/app/build");
		assert_eq!(request.query("token").as_deref(), Some("remote"));
		assert!(request.body.is_empty());
		assert_eq!(request.header("content-type"), None);
	}

	#[tokio::test]
	async fn copy_keeps_source_unnormalized() {
		let transport = created();

		client(&transport)
			.jobs()
			.copy(["folder", "proj", "dup"], "folder/proj")
			.await
			.expect("Copy should succeed.");

		let request = &transport.requests()[0];

		assert_eq!(request.path(), "/job/folder/job/proj/createItem");
		assert_eq!(request.query("name").as_deref(), Some("dup"));
		assert_eq!(request.query("mode").as_deref(), Some("copy"));
		assert_eq!(request.query("from").as_deref(), Some("folder/proj"));
	}

	#[tokio::test]
	async fn create_at_root_sends_xml() {
		let transport = created();

		client(&transport)
			.jobs()
			.create("fresh", "<project/>")
			.await
			.expect("Create should succeed.");

		let request = &transport.requests()[0];

		assert_eq!(request.path(), "/createItem");
		assert_eq!(request.query("name").as_deref(), Some("fresh"));
		assert_eq!(request.header("content-type"), Some(XML_CONTENT_TYPE));
		assert_eq!(request.body_text(), "<project/>");
	}

	#[tokio::test]
	async fn crumb_is_fetched_once_and_only_for_mutations() {
		let transport = created();
		let client = client(&transport).with_crumb_issuer(CrumbIssuer::Endpoint);

		client.jobs().config_xml("app").await.expect("GET should succeed.");

		assert_eq!(transport.count_path("crumbIssuer/api/json"), 0);

		client.jobs().disable("app").await.expect("First POST should succeed.");

		assert_eq!(transport.count_path("crumbIssuer/api/json"), 1);

		client.jobs().destroy("app").await.expect("Second POST should succeed.");

		assert_eq!(transport.count_path("crumbIssuer/api/json"), 1);

		let requests = transport.requests();
		let paths: Vec<_> = requests.iter().map(RecordedRequest::path).collect();

		assert_eq!(
			paths,
			[
				"/job/app/config.xml",
				"/crumbIssuer/api/json",
				"/job/app/disable",
				"/job/app/doDelete"
			]
		);
		assert_eq!(requests[2].header("jenkins-crumb"), Some("c0ffee"));
		assert_eq!(requests[3].header("jenkins-crumb"), Some("c0ffee"));
	}

	#[tokio::test]
	async fn get_sends_only_present_selectors() {
		let transport = RecordingTransport::new(|_| {
			Some(canned_json(200, serde_json::json!({ "name": "app", "color": "blue" })))
		});
		let client = client(&transport);
		let job = client.jobs().get("app").await.expect("Job lookup should succeed.");

		client
			.jobs()
			.get(JobQuery::new("app").with_tree("jobs[name]").with_depth(2))
			.await
			.expect("Job lookup with selectors should succeed.");

		let requests = transport.requests();

		assert_eq!(job["color"], "blue");
		assert_eq!(requests[0].url.query(), None);
		assert_eq!(requests[1].query("tree").as_deref(), Some("jobs[name]"));
		assert_eq!(requests[1].query("depth").as_deref(), Some("2"));
	}

	#[tokio::test]
	async fn get_builds_defaults_tree_and_tolerates_missing_builds() {
		let transport = RecordingTransport::new(|req| match req.path() {
			"/job/empty/api/json" => Some(canned_json(200, serde_json::json!({}))),
			_ => Some(canned_json(
				200,
				serde_json::json!({
					"builds": [
						{ "number": 2, "result": null, "building": true, "displayName": "#2" },
						{ "number": 1, "result": "SUCCESS", "building": false }
					]
				}),
			)),
		});
		let client = client(&transport);
		let builds = client.jobs().get_builds("app", None).await.expect("Builds should decode.");
		let empty =
			client.jobs().get_builds("empty", None).await.expect("Missing builds is empty.");

		assert_eq!(builds.len(), 2);
		assert_eq!(builds[0].display_name.as_deref(), Some("#2"));
		assert_eq!(builds[1].result.as_deref(), Some("SUCCESS"));
		assert!(empty.is_empty());
		assert_eq!(transport.requests()[0].query("tree").as_deref(), Some(DEFAULT_BUILDS_TREE));
	}

	#[tokio::test]
	async fn empty_job_name_is_rejected_without_network() {
		let transport = created();
		let err = client(&transport).jobs().enable("").await.expect_err("Empty name is invalid.");

		assert!(matches!(err, Error::InvalidArgument { .. }));
		assert!(transport.requests().is_empty());
	}
}
