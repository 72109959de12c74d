//! Named instance records and lookup.

// self
use crate::{_prelude::*, error::ConfigError, secret::TokenSecret};

/// One configured Jenkins controller or Argo CD API server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
	/// Unique name used to address the instance.
	pub name: String,
	/// Base URL of the instance.
	pub url: Url,
	/// Static API token; skips session issuance when present.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<TokenSecret>,
	/// Username overriding the service-wide default.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// Password overriding the service-wide default.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<TokenSecret>,
}
impl Instance {
	/// Creates an instance record without credentials.
	pub fn new(name: impl Into<String>, url: Url) -> Self {
		Self { name: name.into(), url, token: None, username: None, password: None }
	}

	/// Attaches a static token.
	pub fn with_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.token = Some(token.into());

		self
	}

	/// Attaches per-instance credentials.
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<TokenSecret>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(password.into());

		self
	}

	/// Static token, ignoring empty strings.
	pub fn static_token(&self) -> Option<&TokenSecret> {
		self.token.as_ref().filter(|token| !token.is_empty())
	}
}

/// Validated, ordered set of instances.
///
/// Construction rejects empty and duplicate names so every lookup resolves to exactly one
/// record; iteration keeps the configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceRegistry {
	instances: Vec<Instance>,
}
impl InstanceRegistry {
	/// Validates and stores `instances`.
	pub fn new(instances: Vec<Instance>) -> Result<Self, ConfigError> {
		let mut seen = std::collections::HashSet::with_capacity(instances.len());

		for instance in &instances {
			if instance.name.trim().is_empty() {
				return Err(ConfigError::EmptyInstanceName);
			}
			if !seen.insert(instance.name.as_str()) {
				return Err(ConfigError::DuplicateInstance { name: instance.name.clone() });
			}
		}

		Ok(Self { instances })
	}

	/// Resolves `name`, failing with [`Error::InstanceNotFound`] when it is not configured.
	pub fn find(&self, name: &str) -> Result<&Instance> {
		self.instances.iter().find(|instance| instance.name == name).ok_or_else(|| {
			tracing::error!(instance = name, "instance is not configured");

			Error::InstanceNotFound { name: name.to_owned() }
		})
	}

	/// Iterates over the instances in configuration order.
	pub fn iter(&self) -> impl Iterator<Item = &Instance> {
		self.instances.iter()
	}

	/// Number of configured instances.
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	/// Whether no instance is configured.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}
}
impl TryFrom<Vec<Instance>> for InstanceRegistry {
	type Error = ConfigError;

	fn try_from(instances: Vec<Instance>) -> Result<Self, Self::Error> {
		Self::new(instances)
	}
}
