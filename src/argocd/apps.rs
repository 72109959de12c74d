//! Application lookups, cross-instance search, revisions, sync, and deletion.

// crates.io
use ::http::Method;
use futures::future;
// self
use crate::{
	_prelude::*,
	argocd::{
		Application, ApplicationList, ArgoCdService, Expand, FindApplicationsOptions,
		FindApplicationsReport, GetApplicationOptions, InstanceFailure, InstanceMatch, InstanceRef,
		ListAppsOptions, RawApplicationList, RevisionMetadata, RevisionOptions, SyncOptions,
	},
	dispatch::Dispatcher,
	http::HttpTransport,
	instance::Instance,
	obs::{self, Call},
	request::{RequestOptions, encode_component},
};

/// Applications endpoint, relative to the instance URL.
pub const APPLICATIONS_PATH: &str = "api/v1/applications";

impl<C> ArgoCdService<C>
where
	C: ?Sized + HttpTransport,
{
	/// Lists the applications of one instance.
	///
	/// A `null` or missing `items` field is logged and reported as an empty list. Every returned
	/// application carries `metadata.instance`.
	pub async fn list_argo_apps(
		&self,
		instance_name: &str,
		options: ListAppsOptions,
	) -> Result<ApplicationList> {
		let context = format!("Failed to list Argo CD applications on `{instance_name}`");

		obs::observe(Call::argocd("list_argo_apps"), async {
			let (instance, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::get()
				.query_opt("selector", options.selector.as_deref())
				.query_opt("name", options.name.as_deref())
				.query_opt("appNamespace", options.app_namespace.as_deref())
				.query_opt("project", options.project.as_deref());
			let raw: RawApplicationList =
				dispatcher.send(APPLICATIONS_PATH, request, None).await?.into_json()?;
			let mut items = raw.items.unwrap_or_default();

			if items.is_empty() {
				tracing::warn!(
					instance = %instance.name,
					selector = ?options.selector,
					name = ?options.name,
					"no Argo CD applications matched"
				);
			}

			items.iter_mut().for_each(|app| app.annotate(instance_ref(instance)));

			Ok(ApplicationList { items })
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Fetches one application by name.
	pub async fn get_application(
		&self,
		instance_name: &str,
		options: GetApplicationOptions,
	) -> Result<Application> {
		let context =
			format!("Failed to fetch Argo CD application `{}` on `{instance_name}`", options.name);

		obs::observe(Call::argocd("get_application"), async {
			let path = application_path(&options.name, "")?;
			let (instance, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::get()
				.query_opt("appNamespace", options.app_namespace.as_deref())
				.query_opt("project", options.project.as_deref());
			let mut app: Application = dispatcher.send(&path, request, None).await?.into_json()?;

			app.annotate(instance_ref(instance));

			Ok(app)
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Fetches the commit metadata of one revision.
	pub async fn get_revision_details(
		&self,
		instance_name: &str,
		options: RevisionOptions,
	) -> Result<RevisionMetadata> {
		let context = format!(
			"Failed to fetch revision `{}` of Argo CD application `{}` on `{instance_name}`",
			options.revision, options.app
		);

		obs::observe(Call::argocd("get_revision_details"), async {
			let (_, dispatcher) = self.connect(instance_name).await?;

			fetch_revision(&dispatcher, &options).await
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Fetches the metadata of several revisions of one application concurrently.
	///
	/// One session is resolved for all requests; results keep the order of `revisions` and the
	/// first failure in that order fails the call.
	pub async fn get_revision_details_list(
		&self,
		instance_name: &str,
		app: &str,
		app_namespace: Option<&str>,
		revisions: &[String],
	) -> Result<Vec<RevisionMetadata>> {
		let context = format!(
			"Failed to fetch revisions of Argo CD application `{app}` on `{instance_name}`"
		);

		obs::observe(Call::argocd("get_revision_details_list"), async {
			let (_, dispatcher) = self.connect(instance_name).await?;
			let lookups: Vec<RevisionOptions> = revisions
				.iter()
				.map(|revision| RevisionOptions {
					app: app.to_owned(),
					app_namespace: app_namespace.map(str::to_owned),
					revision: revision.clone(),
				})
				.collect();
			let results =
				future::join_all(lookups.iter().map(|lookup| fetch_revision(&dispatcher, lookup)))
					.await;

			results.into_iter().collect()
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Searches every instance for `app_name`, failing on the first instance error.
	///
	/// Instances are queried concurrently; the result keeps configuration order and omits
	/// instances without a match. Errors are reported in configuration order as well.
	pub async fn find_applications(
		&self,
		options: FindApplicationsOptions,
	) -> Result<Vec<InstanceMatch>> {
		let mut matches = Vec::new();

		for (_, outcome) in self.search_instances(&options).await {
			if let Some(found) = outcome? {
				matches.push(found);
			}
		}

		Ok(matches)
	}

	/// Searches every instance for `app_name`, collecting per-instance failures.
	pub async fn find_applications_settled(
		&self,
		options: FindApplicationsOptions,
	) -> FindApplicationsReport {
		let mut report = FindApplicationsReport::default();

		for (instance, outcome) in self.search_instances(&options).await {
			match outcome {
				Ok(Some(found)) => report.matches.push(found),
				Ok(None) => (),
				Err(error) => report.failures.push(InstanceFailure { instance, error }),
			}
		}

		report
	}

	/// Triggers a sync and returns the application as reported by the server.
	pub async fn sync_application(
		&self,
		instance_name: &str,
		app_name: &str,
		options: SyncOptions,
	) -> Result<Application> {
		let context =
			format!("Failed to sync Argo CD application `{app_name}` on `{instance_name}`");

		obs::observe(Call::argocd("sync_application"), async {
			let path = application_path(app_name, "/sync")?;
			let (instance, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::post().json(&options)?;
			let mut app: Application = dispatcher.send(&path, request, None).await?.into_json()?;

			app.annotate(instance_ref(instance));

			Ok(app)
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Deletes an application together with its resources (`cascade=true`).
	pub async fn delete_application(
		&self,
		instance_name: &str,
		app_name: &str,
		app_namespace: Option<&str>,
	) -> Result<()> {
		let context =
			format!("Failed to delete Argo CD application `{app_name}` on `{instance_name}`");

		obs::observe(Call::argocd("delete_application"), async {
			let path = application_path(app_name, "")?;
			let (_, dispatcher) = self.connect(instance_name).await?;
			let request = RequestOptions::default()
				.method(Method::DELETE)
				.query("cascade", true)
				.query_opt("appNamespace", app_namespace);

			dispatcher.send(&path, request, None).await?;

			Ok(())
		})
		.await
		.map_err(|e| e.context(context))
	}

	/// Lists every instance concurrently; outcomes keep configuration order.
	async fn search_instances(
		&self,
		options: &FindApplicationsOptions,
	) -> Vec<(String, Result<Option<InstanceMatch>>)> {
		let searches = self.instances.iter().map(|instance| async move {
			let outcome = self
				.list_argo_apps(&instance.name, options.list_options())
				.await
				.map(|list| to_match(instance, &options.app_name, options.expand, list.items));

			if let Err(e) = &outcome {
				tracing::error!(
					instance = %instance.name,
					error = %e,
					"Argo CD instance search failed"
				);
			}

			(instance.name.clone(), outcome)
		});

		future::join_all(searches).await
	}
}

pub(crate) fn instance_ref(instance: &Instance) -> InstanceRef {
	InstanceRef { name: instance.name.clone(), url: instance.url.clone() }
}

/// `api/v1/applications/<name><suffix>` with the name percent-encoded.
fn application_path(name: &str, suffix: &str) -> Result<String> {
	if name.trim().is_empty() {
		return Err(Error::invalid_argument("application name is required"));
	}

	Ok(format!("{APPLICATIONS_PATH}/{}{suffix}", encode_component(name)))
}

async fn fetch_revision<C>(
	dispatcher: &Dispatcher<C>,
	options: &RevisionOptions,
) -> Result<RevisionMetadata>
where
	C: ?Sized + HttpTransport,
{
	if options.revision.trim().is_empty() {
		return Err(Error::invalid_argument("revision is required"));
	}

	let suffix = format!("/revisions/{}/metadata", encode_component(&options.revision));
	let path = application_path(&options.app, &suffix)?;
	let request =
		RequestOptions::get().query_opt("appNamespace", options.app_namespace.as_deref());

	dispatcher.send(&path, request, None).await?.into_json()
}

fn to_match(
	instance: &Instance,
	app_name: &str,
	expand: Option<Expand>,
	items: Vec<Application>,
) -> Option<InstanceMatch> {
	if items.is_empty() {
		return None;
	}

	Some(InstanceMatch {
		name: instance.name.clone(),
		url: instance.url.clone(),
		app_name: vec![app_name.to_owned()],
		count: items.len(),
		applications: matches!(expand, Some(Expand::Applications)).then_some(items),
	})
}
