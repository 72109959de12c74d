//! Argo CD request options, response models, and creation payloads.

// self
use crate::_prelude::*;

/// Cluster used when no destination server is given.
pub const DEFAULT_DESTINATION_SERVER: &str = "https://kubernetes.default.svc";
/// Finalizer attached to created applications so deletion cascades to their resources.
pub const RESOURCES_FINALIZER: &str = "resources-finalizer.argocd.argoproj.io";
/// Label tying a created application back to its catalog entity.
pub const BACKSTAGE_NAME_LABEL: &str = "backstage-name";

/// Instance annotation added to every application returned by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRef {
	/// Instance name.
	pub name: String,
	/// Instance base URL.
	pub url: Url,
}

/// Metadata block of an Argo CD application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMetadata {
	/// Application name.
	#[serde(default)]
	pub name: String,
	/// Namespace holding the application resource.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	/// Application labels.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	/// Instance the application was read from.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instance: Option<InstanceRef>,
	/// Remaining metadata fields, kept verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// Argo CD application; fields the crate does not read are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
	/// Application metadata.
	#[serde(default)]
	pub metadata: ApplicationMetadata,
	/// `spec`, `status`, and any other top-level field.
	#[serde(flatten)]
	pub rest: serde_json::Map<String, Value>,
}
impl Application {
	/// Annotates the application with the instance it came from.
	pub fn annotate(&mut self, instance: InstanceRef) {
		self.metadata.instance = Some(instance);
	}
}

/// Result of [`ArgoCdService::list_argo_apps`](super::ArgoCdService::list_argo_apps).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationList {
	/// Matching applications; empty when the server answered with `null` or nothing.
	pub items: Vec<Application>,
}

#[derive(Deserialize)]
pub(crate) struct RawApplicationList {
	#[serde(default)]
	pub(crate) items: Option<Vec<Application>>,
}

/// Filters for listing applications.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListAppsOptions {
	/// Label selector such as `backstage-name=my-service`.
	pub selector: Option<String>,
	/// Application name.
	pub name: Option<String>,
	/// Namespace holding the application resources.
	pub app_namespace: Option<String>,
	/// Project name.
	pub project: Option<String>,
}
impl ListAppsOptions {
	/// Filters by label selector.
	pub fn selector(selector: impl Into<String>) -> Self {
		Self { selector: Some(selector.into()), ..Default::default() }
	}

	/// Filters by application name.
	pub fn name(name: impl Into<String>) -> Self {
		Self { name: Some(name.into()), ..Default::default() }
	}

	/// Restricts to one application namespace.
	pub fn with_app_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.app_namespace = Some(namespace.into());

		self
	}

	/// Restricts to one project.
	pub fn with_project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());

		self
	}
}

/// Lookup of a single application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetApplicationOptions {
	/// Application name.
	pub name: String,
	/// Namespace holding the application resource.
	pub app_namespace: Option<String>,
	/// Project the application must belong to.
	pub project: Option<String>,
}
impl GetApplicationOptions {
	/// Looks up `name`.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), ..Default::default() }
	}

	/// Restricts to one application namespace.
	pub fn with_app_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.app_namespace = Some(namespace.into());

		self
	}

	/// Restricts to one project.
	pub fn with_project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());

		self
	}
}

/// Lookup of a revision's commit metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevisionOptions {
	/// Application name.
	pub app: String,
	/// Namespace holding the application resource.
	pub app_namespace: Option<String>,
	/// Revision (commit SHA or tag).
	pub revision: String,
}
impl RevisionOptions {
	/// Looks up `revision` of `app`.
	pub fn new(app: impl Into<String>, revision: impl Into<String>) -> Self {
		Self { app: app.into(), app_namespace: None, revision: revision.into() }
	}

	/// Restricts to one application namespace.
	pub fn with_app_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.app_namespace = Some(namespace.into());

		self
	}
}

/// Commit metadata of one revision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionMetadata {
	/// Commit author.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub author: Option<String>,
	/// Commit date as reported by the server.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date: Option<String>,
	/// Commit message.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Tags pointing at the revision.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tags: Vec<String>,
	/// Remaining fields, kept verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// What [`ArgoCdService::find_applications`](super::ArgoCdService::find_applications)
/// attaches to each match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expand {
	/// Attach the full application bodies.
	Applications,
}

/// Cross-instance application search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindApplicationsOptions {
	/// Application name to look for.
	pub app_name: String,
	/// Namespace holding the application resources.
	pub app_namespace: Option<String>,
	/// Project name.
	pub project: Option<String>,
	/// Attach application bodies instead of counts.
	pub expand: Option<Expand>,
}
impl FindApplicationsOptions {
	/// Searches for `app_name` on every instance.
	pub fn new(app_name: impl Into<String>) -> Self {
		Self { app_name: app_name.into(), ..Default::default() }
	}

	/// Restricts to one application namespace.
	pub fn with_app_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.app_namespace = Some(namespace.into());

		self
	}

	/// Restricts to one project.
	pub fn with_project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());

		self
	}

	/// Attaches full application bodies to each match.
	pub fn expand_applications(mut self) -> Self {
		self.expand = Some(Expand::Applications);

		self
	}

	pub(crate) fn list_options(&self) -> ListAppsOptions {
		ListAppsOptions {
			selector: None,
			name: Some(self.app_name.clone()),
			app_namespace: self.app_namespace.clone(),
			project: self.project.clone(),
		}
	}
}

/// One instance holding at least one matching application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMatch {
	/// Instance name.
	pub name: String,
	/// Instance base URL.
	pub url: Url,
	/// The searched application name, echoed as a single-element list.
	pub app_name: Vec<String>,
	/// Number of matching applications.
	pub count: usize,
	/// Matching applications, when expansion was requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub applications: Option<Vec<Application>>,
}

/// Instance that could not be searched.
#[derive(Debug)]
pub struct InstanceFailure {
	/// Instance name.
	pub instance: String,
	/// Failure, already enriched with the operation context.
	pub error: Error,
}

/// Outcome of [`find_applications_settled`](super::ArgoCdService::find_applications_settled).
#[derive(Debug, Default)]
pub struct FindApplicationsReport {
	/// Instances holding a match, in configuration order.
	pub matches: Vec<InstanceMatch>,
	/// Instances whose lookup failed, in configuration order.
	pub failures: Vec<InstanceFailure>,
}
impl FindApplicationsReport {
	/// Whether every instance answered.
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Input for [`ArgoCdService::create_argo_project`](super::ArgoCdService::create_argo_project).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateProjectOptions {
	/// Project name.
	pub project_name: String,
	/// Namespace the project may deploy to.
	pub namespace: String,
	/// Repositories the project may deploy from.
	pub source_repos: Vec<String>,
	/// Destination cluster; defaults to [`DEFAULT_DESTINATION_SERVER`].
	pub destination_server: Option<String>,
	/// Resource version for optimistic concurrency on updates.
	pub resource_version: Option<String>,
}

/// Input for [`create_argo_application`](super::ArgoCdService::create_argo_application).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateApplicationOptions {
	/// Application name.
	pub app_name: String,
	/// Project the application belongs to.
	pub project_name: String,
	/// Destination namespace.
	pub namespace: String,
	/// Source repository URL.
	pub source_repo: String,
	/// Path of the manifests inside the repository.
	pub source_path: String,
	/// Value of the [`BACKSTAGE_NAME_LABEL`] label.
	pub label_value: String,
	/// Destination cluster; defaults to [`DEFAULT_DESTINATION_SERVER`].
	pub destination_server: Option<String>,
}

/// Input for [`ArgoCdService::create_argo_resources`](super::ArgoCdService::create_argo_resources).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateResourcesOptions {
	/// Application name.
	pub app_name: String,
	/// Project name.
	pub project_name: String,
	/// Destination namespace.
	pub namespace: String,
	/// Source repository URL.
	pub source_repo: String,
	/// Path of the manifests inside the repository.
	pub source_path: String,
	/// Value of the [`BACKSTAGE_NAME_LABEL`] label.
	pub label_value: String,
	/// Destination cluster; defaults to [`DEFAULT_DESTINATION_SERVER`].
	pub destination_server: Option<String>,
}
impl CreateResourcesOptions {
	/// Project half of the request.
	pub fn project(&self) -> CreateProjectOptions {
		CreateProjectOptions {
			project_name: self.project_name.clone(),
			namespace: self.namespace.clone(),
			source_repos: vec![self.source_repo.clone()],
			destination_server: self.destination_server.clone(),
			resource_version: None,
		}
	}

	/// Application half of the request.
	pub fn application(&self) -> CreateApplicationOptions {
		CreateApplicationOptions {
			app_name: self.app_name.clone(),
			project_name: self.project_name.clone(),
			namespace: self.namespace.clone(),
			source_repo: self.source_repo.clone(),
			source_path: self.source_path.clone(),
			label_value: self.label_value.clone(),
			destination_server: self.destination_server.clone(),
		}
	}
}

/// Project and application created by
/// [`ArgoCdService::create_argo_resources`](super::ArgoCdService::create_argo_resources).
#[derive(Clone, Debug, PartialEq)]
pub struct CreatedResources {
	/// Project as returned by the server.
	pub project: Value,
	/// Application as returned by the server.
	pub application: Application,
}

/// Sync request options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
	/// Namespace holding the application resource.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub app_namespace: Option<String>,
	/// Revision to sync to; the tracked revision when absent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub revision: Option<String>,
	/// Deletes resources no longer in the source.
	pub prune: bool,
	/// Validates without applying.
	pub dry_run: bool,
}

/// `POST /api/v1/projects` body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectPayload {
	/// Project resource.
	pub project: ProjectResource,
}
impl From<&CreateProjectOptions> for ProjectPayload {
	fn from(options: &CreateProjectOptions) -> Self {
		let server =
			options.destination_server.as_deref().unwrap_or(DEFAULT_DESTINATION_SERVER).to_owned();

		Self {
			project: ProjectResource {
				metadata: ProjectMetadata {
					name: options.project_name.clone(),
					resource_version: options.resource_version.clone(),
				},
				spec: ProjectSpec {
					destinations: vec![ProjectDestination {
						name: "local".into(),
						namespace: options.namespace.clone(),
						server,
					}],
					source_repos: options.source_repos.clone(),
				},
			},
		}
	}
}

/// Project resource inside a [`ProjectPayload`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectResource {
	/// Project metadata.
	pub metadata: ProjectMetadata,
	/// Project spec.
	pub spec: ProjectSpec,
}

/// Project metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
	/// Project name.
	pub name: String,
	/// Resource version for updates.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resource_version: Option<String>,
}

/// Project spec.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
	/// Allowed deployment targets.
	pub destinations: Vec<ProjectDestination>,
	/// Allowed source repositories.
	pub source_repos: Vec<String>,
}

/// One allowed deployment target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectDestination {
	/// Destination name.
	pub name: String,
	/// Destination namespace.
	pub namespace: String,
	/// Destination cluster.
	pub server: String,
}

/// `POST /api/v1/applications` body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplicationPayload {
	/// Application metadata.
	pub metadata: ApplicationPayloadMetadata,
	/// Application spec.
	pub spec: ApplicationSpec,
}
impl From<&CreateApplicationOptions> for ApplicationPayload {
	fn from(options: &CreateApplicationOptions) -> Self {
		let server =
			options.destination_server.as_deref().unwrap_or(DEFAULT_DESTINATION_SERVER).to_owned();

		Self {
			metadata: ApplicationPayloadMetadata {
				name: options.app_name.clone(),
				labels: BTreeMap::from([(
					BACKSTAGE_NAME_LABEL.to_owned(),
					options.label_value.clone(),
				)]),
				finalizers: vec![RESOURCES_FINALIZER.to_owned()],
			},
			spec: ApplicationSpec {
				destination: ApplicationDestination {
					namespace: options.namespace.clone(),
					server,
				},
				project: options.project_name.clone(),
				revision_history_limit: 10,
				source: ApplicationSource {
					path: options.source_path.clone(),
					repo_url: options.source_repo.clone(),
				},
				sync_policy: SyncPolicy::default(),
			},
		}
	}
}

/// Metadata of a created application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplicationPayloadMetadata {
	/// Application name.
	pub name: String,
	/// Labels, including [`BACKSTAGE_NAME_LABEL`].
	pub labels: BTreeMap<String, String>,
	/// Finalizers, including [`RESOURCES_FINALIZER`].
	pub finalizers: Vec<String>,
}

/// Spec of a created application.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
	/// Deployment target.
	pub destination: ApplicationDestination,
	/// Owning project.
	pub project: String,
	/// Number of sync results kept in history.
	pub revision_history_limit: u32,
	/// Manifest source.
	pub source: ApplicationSource,
	/// Automated sync policy.
	pub sync_policy: SyncPolicy,
}

/// Deployment target of an application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplicationDestination {
	/// Target namespace.
	pub namespace: String,
	/// Target cluster.
	pub server: String,
}

/// Manifest source of an application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApplicationSource {
	/// Path inside the repository.
	pub path: String,
	/// Repository URL.
	#[serde(rename = "repoURL")]
	pub repo_url: String,
}

/// Automated sync with retries.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
	/// Automated sync switches.
	pub automated: AutomatedSync,
	/// Retry policy for failed syncs.
	pub retry: SyncRetry,
	/// Extra sync options.
	pub sync_options: Vec<String>,
}
impl Default for SyncPolicy {
	fn default() -> Self {
		Self {
			automated: AutomatedSync { allow_empty: true, prune: true, self_heal: true },
			retry: SyncRetry {
				backoff: SyncBackoff {
					duration: "5s".into(),
					factor: 2,
					max_duration: "5m".into(),
				},
				limit: 10,
			},
			sync_options: vec!["CreateNamespace=false".into(), "FailOnSharedResource=true".into()],
		}
	}
}

/// Automated sync switches.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
	/// Allows syncing to an empty set of resources.
	pub allow_empty: bool,
	/// Deletes resources no longer in the source.
	pub prune: bool,
	/// Reverts manual drift.
	pub self_heal: bool,
}

/// Retry policy for failed syncs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncRetry {
	/// Backoff between attempts.
	pub backoff: SyncBackoff,
	/// Maximum number of attempts.
	pub limit: u32,
}

/// Backoff between sync retries.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBackoff {
	/// Initial delay.
	pub duration: String,
	/// Multiplier applied after each attempt.
	pub factor: u32,
	/// Upper bound for the delay.
	pub max_duration: String,
}
