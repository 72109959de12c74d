#![cfg(feature = "reqwest")]

mod common;

// std
use std::time::{Duration, Instant};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use pipeline_relay::{
	argocd::{
		CreateProjectOptions, CreateResourcesOptions, FindApplicationsOptions,
		GetApplicationOptions, ListAppsOptions,
	},
	error::{Error, ErrorKind},
	instance::Instance,
};

fn app(name: &str) -> serde_json::Value {
	json!({ "metadata": { "name": name, "namespace": "argocd" }, "spec": { "project": "team" } })
}

#[tokio::test]
async fn null_items_list_as_empty() {
	let server = MockServer::start_async().await;
	let list = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/applications")
				.query_param("selector", "backstage-name=svc")
				.header("authorization", "Bearer prod-token");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "metadata": {}, "items": null }));
		})
		.await;
	let service = common::argocd(vec![common::static_instance("prod", &server)]);
	let apps = service
		.list_argo_apps("prod", ListAppsOptions::selector("backstage-name=svc"))
		.await
		.expect("Null items should be accepted.");

	assert!(apps.items.is_empty());
	list.assert_calls_async(1).await;
}

#[tokio::test]
async fn find_applications_fans_out_in_configuration_order() {
	let east = MockServer::start_async().await;
	let west = MockServer::start_async().await;
	let empty = MockServer::start_async().await;

	for server in [&east, &west] {
		server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v1/applications").query_param("name", "svc");
				then.status(200)
					.header("content-type", "application/json")
					.json_body(json!({ "items": [app("svc")] }));
			})
			.await;
	}
	empty
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/applications");
			then.status(200).header("content-type", "application/json").json_body(json!({}));
		})
		.await;

	let service = common::argocd(vec![
		common::static_instance("west", &west),
		common::static_instance("empty", &empty),
		common::static_instance("east", &east),
	]);
	let matches = service
		.find_applications(FindApplicationsOptions::new("svc").expand_applications())
		.await
		.expect("Every instance answers.");
	let names: Vec<_> = matches.iter().map(|found| found.name.as_str()).collect();

	assert_eq!(names, ["west", "east"]);
	assert!(matches.iter().all(|found| found.count == 1 && found.app_name == ["svc"]));

	let applications = matches[0].applications.as_ref().expect("Expansion was requested.");
	let annotated = applications[0].metadata.instance.as_ref().expect("Apps are annotated.");

	assert_eq!(annotated.name, "west");
	assert_eq!(annotated.url, common::server_url(&west));
}

#[tokio::test]
async fn find_applications_queries_instances_concurrently() {
	const DELAY: Duration = Duration::from_millis(500);

	let first = MockServer::start_async().await;
	let second = MockServer::start_async().await;
	let mut mocks = Vec::new();

	for server in [&first, &second] {
		let mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v1/applications").query_param("name", "svc");
				then.status(200)
					.header("content-type", "application/json")
					.json_body(json!({ "items": [app("svc")] }))
					.delay(DELAY);
			})
			.await;

		mocks.push(mock);
	}

	let service = common::argocd(vec![
		common::static_instance("first", &first),
		common::static_instance("second", &second),
	]);
	let started = Instant::now();
	let matches = service
		.find_applications(FindApplicationsOptions::new("svc"))
		.await
		.expect("Both instances answer.");
	let elapsed = started.elapsed();

	assert_eq!(matches.len(), 2);
	assert!(elapsed < DELAY * 2, "lookups ran sequentially: {elapsed:?}");

	for mock in mocks {
		mock.assert_calls_async(1).await;
	}
}

#[tokio::test]
async fn settled_search_reports_failed_instances() {
	let up = MockServer::start_async().await;
	let down = MockServer::start_async().await;

	up.mock_async(|when, then| {
		when.method(GET).path("/api/v1/applications");
		then.status(200)
			.header("content-type", "application/json")
			.json_body(json!({ "items": [app("svc")] }));
	})
	.await;
	down.mock_async(|when, then| {
		when.method(GET).path("/api/v1/applications");
		then.status(502).body("bad gateway");
	})
	.await;

	let service = common::argocd(vec![
		common::static_instance("down", &down),
		common::static_instance("up", &up),
	]);
	let err = service
		.find_applications(FindApplicationsOptions::new("svc"))
		.await
		.expect_err("Fail-fast search should surface the broken instance.");

	assert_eq!(err.status(), Some(502));
	assert!(err.to_string().contains("`down`"));

	let report = service.find_applications_settled(FindApplicationsOptions::new("svc")).await;

	assert!(!report.is_complete());
	assert_eq!(report.matches.len(), 1);
	assert_eq!(report.matches[0].name, "up");
	assert_eq!(report.failures[0].instance, "down");
}

#[tokio::test]
async fn credentials_are_exchanged_for_a_session_token() {
	let server = MockServer::start_async().await;
	let session = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/session")
				.json_body(json!({ "username": "admin", "password": "hunter2" }));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "token": "issued-token" }));
		})
		.await;
	let get = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/applications/svc")
				.header("authorization", "Bearer issued-token");
			then.status(200).header("content-type", "application/json").json_body(app("svc"));
		})
		.await;
	let service = common::argocd(vec![Instance::new("prod", common::server_url(&server))])
		.with_credentials("admin", "hunter2");
	let app = service
		.get_application("prod", GetApplicationOptions::new("svc"))
		.await
		.expect("Application should be returned.");

	assert_eq!(app.metadata.name, "svc");
	assert_eq!(app.rest["spec"]["project"], "team");
	session.assert_calls_async(1).await;
	get.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_logins_are_authentication_errors() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/session");
			then.status(401)
				.header("content-type", "application/json")
				.json_body(json!({ "error": "invalid username or password" }));
		})
		.await;

	let service = common::argocd(vec![
		Instance::new("prod", common::server_url(&server)).with_credentials("admin", "wrong"),
	]);
	let err = service
		.list_argo_apps("prod", ListAppsOptions::default())
		.await
		.expect_err("Rejected credentials should fail.");

	assert_eq!(err.kind(), ErrorKind::Authentication);
	assert!(err.to_string().contains("Failed to get an Argo CD token for `prod`"));
}

#[tokio::test]
async fn creation_refusals_are_typed() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/projects");
			then.status(403).header("content-type", "application/json").json_body(json!({
				"error": "permission denied",
				"message": "permission denied: projects, create, team"
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/applications");
			then.status(400).header("content-type", "application/json").json_body(json!({
				"message": "existing application spec is different; use upsert flag to force update"
			}));
		})
		.await;

	let service = common::argocd(vec![common::static_instance("prod", &server)]);
	let project = CreateProjectOptions {
		project_name: "team".into(),
		namespace: "svc".into(),
		source_repos: vec!["https://git.example.com/svc.git".into()],
		..Default::default()
	};
	let forbidden = service
		.create_argo_project("prod", project)
		.await
		.expect_err("Forbidden creation should fail.");

	assert!(matches!(
		&forbidden,
		Error::NotAllowed { message } if message.contains("permission denied: projects, create")
	));
	assert!(forbidden.to_string().contains("403"));
	assert!(forbidden.to_string().contains(&server.url("/api/v1/projects")));

	let resources = CreateResourcesOptions {
		app_name: "svc".into(),
		project_name: "team".into(),
		namespace: "svc".into(),
		source_repo: "https://git.example.com/svc.git".into(),
		source_path: "k8s".into(),
		label_value: "svc".into(),
		destination_server: None,
	};
	let conflict = service
		.create_argo_application("prod", resources.application())
		.await
		.expect_err("Spec conflicts should fail.");

	assert_eq!(conflict.kind(), ErrorKind::Conflict);
	assert!(conflict.to_string().contains("400"));
	assert!(conflict.to_string().contains(&server.url("/api/v1/applications")));
}
