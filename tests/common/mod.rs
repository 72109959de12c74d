//! Shared fixtures for the HTTP integration suites.

#![allow(dead_code)]

// crates.io
use httpmock::MockServer;
use url::Url;
// self
use pipeline_relay::{
	argocd::ReqwestArgoCdService,
	http::ReqwestHttpClient,
	instance::{Instance, InstanceRegistry},
	jenkins::{CrumbIssuer, JenkinsClient, ReqwestJenkinsClient},
};

/// Builds a reqwest client that accepts the self-signed certificates served by `httpmock`.
pub fn http_client() -> ReqwestHttpClient {
	ReqwestHttpClient::insecure().expect("Insecure test client should build.")
}

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("Mock server URL should parse.")
}

pub fn server_url(server: &MockServer) -> Url {
	url(&server.base_url())
}

pub fn jenkins(server: &MockServer, issuer: CrumbIssuer) -> ReqwestJenkinsClient {
	JenkinsClient::with_http_client(server_url(server), http_client()).with_crumb_issuer(issuer)
}

pub fn argocd(instances: Vec<Instance>) -> ReqwestArgoCdService {
	let registry = InstanceRegistry::new(instances).expect("Mock instances should be valid.");

	ReqwestArgoCdService::with_http_client(registry, http_client())
}

pub fn static_instance(name: &str, server: &MockServer) -> Instance {
	Instance::new(name, server_url(server)).with_token(format!("{name}-token"))
}
