//! Searches two mocked Argo CD instances for one application, logging in to the instance that
//! has no static token, then queues a Jenkins build for the same service.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use pipeline_relay::{
	argocd::{ArgoCdConfig, FindApplicationsOptions, ReqwestArgoCdService},
	http::ReqwestHttpClient,
	instance::Instance,
	jenkins::{BuildOptions, CrumbIssuer, JenkinsClient},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let staging = MockServer::start_async().await;
	let production = MockServer::start_async().await;
	let jenkins = MockServer::start_async().await;
	let apps = serde_json::json!({
		"items": [{ "metadata": { "name": "checkout" }, "spec": { "project": "shop" } }]
	});

	staging
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/applications").query_param("name", "checkout");
			then.status(200).header("content-type", "application/json").json_body(apps.clone());
		})
		.await;
	production
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/session");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "token": "demo-session" }));
		})
		.await;
	production
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/applications")
				.header("authorization", "Bearer demo-session");
			then.status(200).header("content-type", "application/json").json_body(apps.clone());
		})
		.await;

	let crumb_mock = jenkins
		.mock_async(|when, then| {
			when.method(GET).path("/crumbIssuer/api/json");
			then.status(200).header("content-type", "application/json").json_body(
				serde_json::json!({ "crumbRequestField": "Jenkins-Crumb", "crumb": "demo" }),
			);
		})
		.await;
	let build_mock = jenkins
		.mock_async(|when, then| {
			when.method(POST)
				.path("/job/shop/job/checkout/buildWithParameters")
				.header("jenkins-crumb", "demo");
			then.status(201);
		})
		.await;
	let config = ArgoCdConfig {
		instances: vec![
			Instance::new("staging", Url::parse(&staging.base_url())?).with_token("static-token"),
			Instance::new("production", Url::parse(&production.base_url())?),
		],
		username: Some("admin".into()),
		password: Some("demo-password".into()),
		session_ttl_secs: Some(300),
	};
	let argocd = ReqwestArgoCdService::from_config(config, ReqwestHttpClient::default())?;
	let search = FindApplicationsOptions::new("checkout").expand_applications();
	let matches = argocd.find_applications(search).await?;

	for found in &matches {
		println!("{} ({}) hosts {} matching application(s).", found.name, found.url, found.count);
	}

	let ci = JenkinsClient::<ReqwestHttpClient>::new(Url::parse(&jenkins.base_url())?)
		.with_crumb_issuer(CrumbIssuer::Endpoint);

	ci.jobs()
		.build("shop/checkout", BuildOptions::new().parameter("REVISION", "main"))
		.await?;

	println!("Queued shop/checkout on Jenkins.");

	crumb_mock.assert_async().await;
	build_mock.assert_async().await;

	Ok(())
}
