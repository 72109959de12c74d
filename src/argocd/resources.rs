//! Project and application creation, and project deletion.

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	argocd::{
		Application, ApplicationPayload, ArgoCdService, CreateApplicationOptions,
		CreateProjectOptions, CreateResourcesOptions, CreatedResources, ProjectPayload,
		apps::{APPLICATIONS_PATH, instance_ref},
	},
	dispatch::Dispatcher,
	error::UpstreamError,
	http::HttpTransport,
	obs::{self, Call},
	request::{RequestOptions, ResponseBody, encode_component},
};

/// Projects endpoint, relative to the instance URL.
pub const PROJECTS_PATH: &str = "api/v1/projects";

const SPEC_CONFLICT_MARKERS: [&str; 2] =
	["existing project spec is different", "existing application spec is different"];

#[derive(Deserialize)]
struct ArgoErrorBody {
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

impl<C> ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a project allowed to deploy `source_repos` into `namespace`.
	///
	/// Returns the project as stored by the server.
	pub async fn create_argo_project(
		&self,
		instance_name: &str,
		options: CreateProjectOptions,
	) -> Result<Value> {
		let context = format!(
			"Failed to create Argo CD project `{}` on `{instance_name}`",
			options.project_name
		);

		obs::observe(Call::argocd("create_argo_project"), async {
			require("project name", &options.project_name)?;
			require("namespace", &options.namespace)?;

			let (_, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::post().json(&ProjectPayload::from(&options))?;

			create(&dispatcher, PROJECTS_PATH, request).await?.into_json()
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Creates an application with the automated sync policy and the catalog label.
	pub async fn create_argo_application(
		&self,
		instance_name: &str,
		options: CreateApplicationOptions,
	) -> Result<Application> {
		let context = format!(
			"Failed to create Argo CD application `{}` on `{instance_name}`",
			options.app_name
		);

		obs::observe(Call::argocd("create_argo_application"), async {
			require("application name", &options.app_name)?;
			require("project name", &options.project_name)?;

			let (instance, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::post().json(&ApplicationPayload::from(&options))?;
			let mut app: Application =
				create(&dispatcher, APPLICATIONS_PATH, request).await?.into_json()?;

			app.annotate(instance_ref(instance));

			Ok(app)
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Creates the project, then the application.
	///
	/// A project created before a failing application call is left in place.
	pub async fn create_argo_resources(
		&self,
		instance_name: &str,
		options: CreateResourcesOptions,
	) -> Result<CreatedResources> {
		let project = self.create_argo_project(instance_name, options.project()).await?;
		let application = self
			.create_argo_application(instance_name, options.application())
			.await
			.inspect_err(|_| {
				tracing::warn!(
					instance = instance_name,
					project = %options.project_name,
					"Argo CD project was created but its application was not"
				);
			})?;

		Ok(CreatedResources { project, application })
	}

	/// Deletes a project.
	pub async fn delete_project(&self, instance_name: &str, project_name: &str) -> Result<()> {
		let context =
			format!("Failed to delete Argo CD project `{project_name}` on `{instance_name}`");

		obs::observe(Call::argocd("delete_project"), async {
			require("project name", project_name)?;

			let (_, dispatcher) = self.connect(instance_name).await?;
			let path = format!("{PROJECTS_PATH}/{}", encode_component(project_name));

			dispatcher.send(&path, RequestOptions::default().method(Method::DELETE), None).await?;

			Ok(())
		})
		.await
		.map_err(|e| e.context(context))
	}
}

fn require(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::invalid_argument(format!("{field} is required")));
	}

	Ok(())
}

/// Posts a creation payload, translating refusals into typed errors.
async fn create<C>(
	dispatcher: &Dispatcher<C>,
	path: &str,
	request: RequestOptions,
) -> Result<ResponseBody>
where
	C: ?Sized + HttpTransport,
{
	let exchange = dispatcher.exchange(path, request, None).await?;

	if exchange.response.status().is_success() {
		return exchange.into_body(false);
	}

	Err(creation_error(exchange.into_upstream_error()))
}

/// 403 becomes [`Error::NotAllowed`] carrying the server's own message, and a clash with an
/// existing resource of a different spec becomes [`Error::Conflict`]. Both keep the request line
/// and status in their message.
fn creation_error(err: UpstreamError) -> Error {
	let body = serde_json::from_str::<ArgoErrorBody>(&err.body).ok();
	let reason = body
		.and_then(|body| body.message.or(body.error))
		.filter(|reason| !reason.is_empty())
		.unwrap_or_else(|| err.body.clone());
	let message =
		format!("{} {} failed with status {}: {reason}", err.method, err.url, err.status);

	if err.status == 403 {
		return Error::NotAllowed { message };
	}
	if SPEC_CONFLICT_MARKERS.iter().any(|marker| reason.contains(marker)) {
		return Error::Conflict { message };
	}

	err.into()
}
